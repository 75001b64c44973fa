mod common;

use rill::domain::{RuleActions, RuleFilter, SearchScope, SourceRule};
use rill::service::mock::MockMiniflux;
use rill::store::{SettingsStore, Store};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn login_then_sync_pages_through_everything() {
    let mock = common::server(5);
    let ctx = common::context(&mock);

    let setup = assert_ok!(ctx.engine.setup(common::account()).await);
    assert_eq!(setup.sources_added, 2);
    assert_eq!(setup.groups_added, 1);

    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.new_items, 5);
    assert_eq!(ctx.store.get_all_items().unwrap().len(), 5);
    assert_eq!(ctx.store.load_service_config().unwrap().unwrap().last_id, Some(5));

    ctx.shutdown().await;
}

#[tokio::test]
async fn second_sync_only_fetches_newer_entries() {
    let mock = common::server(3);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);

    mock.add_entry(MockMiniflux::make_entry(4, 11));
    mock.clear_requests();
    let report = assert_ok!(ctx.engine.sync().await);

    assert_eq!(report.new_items, 1);
    let item = ctx.store.get_item_by_service_ref("4").unwrap().unwrap();
    let news = ctx.store.get_source_by_service_ref("11").unwrap().unwrap();
    assert_eq!(item.source_id, news.id);

    let incremental = mock
        .requests()
        .into_iter()
        .find(|r| r.route() == "entries" && r.query("after_entry_id").is_some())
        .expect("incremental request");
    assert_eq!(incremental.query("after_entry_id").as_deref(), Some("3"));

    ctx.shutdown().await;
}

#[tokio::test]
async fn empty_sync_leaves_cursor_alone() {
    let mock = common::server(2);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);

    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.new_items, 0);
    assert_eq!(ctx.store.load_service_config().unwrap().unwrap().last_id, Some(2));

    ctx.shutdown().await;
}

#[tokio::test]
async fn remote_changes_flow_back_into_local_flags() {
    let mock = common::server(3);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);

    mock.set_entry_flags(2, true, false);
    mock.set_entry_flags(3, false, true);
    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.read_changed, 1);
    assert_eq!(report.starred_changed, 1);

    assert!(ctx.store.get_item_by_service_ref("2").unwrap().unwrap().is_read);
    assert!(ctx.store.get_item_by_service_ref("3").unwrap().unwrap().is_starred);
    assert!(!ctx.store.get_item_by_service_ref("1").unwrap().unwrap().is_read);

    ctx.shutdown().await;
}

#[tokio::test]
async fn rule_overrides_reach_the_server() {
    let mock = common::server(0);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);

    let blog = ctx.store.get_source_by_service_ref("10").unwrap().unwrap();
    let rule = SourceRule::new(
        RuleFilter {
            search: "Ferris".into(),
            scope: SearchScope::Author,
            case_sensitive: true,
        },
        RuleActions {
            read: Some(true),
            starred: Some(true),
            ..Default::default()
        },
    );
    ctx.store.set_source_rules(blog.id, &[rule]).unwrap();

    mock.add_entry(MockMiniflux::make_entry(1, 10));
    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.queued_commands, 2);

    let item = ctx.store.get_item_by_service_ref("1").unwrap().unwrap();
    assert!(item.is_read);
    assert!(item.is_starred);

    // Flush the command queue before checking the server.
    ctx.shutdown().await;
    let entry = mock.entry(1).unwrap();
    assert!(entry.is_read());
    assert!(entry.starred);
}

#[tokio::test]
async fn user_changes_are_pushed() {
    let mock = common::server(2);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);
    let item = ctx.store.get_item_by_service_ref("1").unwrap().unwrap();

    assert_ok!(ctx.engine.set_read(item.id, true).await);
    assert_ok!(ctx.engine.set_starred(item.id, true).await);
    let entry = mock.entry(1).unwrap();
    assert!(entry.is_read());
    assert!(entry.starred);

    // The next sync agrees with the server, so nothing flips back.
    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.read_changed + report.starred_changed, 0);

    ctx.shutdown().await;
}

#[tokio::test]
async fn read_all_for_one_source() {
    let mock = common::server(3);
    mock.add_entry(MockMiniflux::make_entry(4, 11));
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);

    let blog = ctx.store.get_source_by_service_ref("10").unwrap().unwrap();
    let changed = assert_ok!(ctx.engine.mark_all_read(&[blog.id], None).await);
    assert_eq!(changed, 3);

    let paths: Vec<String> = mock.requests().iter().map(|r| r.path.clone()).collect();
    assert!(paths.contains(&"feeds/10/mark-all-as-read".to_string()));
    assert!(!paths.contains(&"feeds/11/mark-all-as-read".to_string()));
    assert!(!ctx.store.get_item_by_service_ref("4").unwrap().unwrap().is_read);

    ctx.shutdown().await;
}

#[tokio::test]
async fn offline_login_fails_cleanly() {
    let mock = common::server(0);
    mock.set_offline(true);
    let ctx = common::context(&mock);

    let err = assert_err!(ctx.engine.setup(common::account()).await);
    assert!(err.is_service_failure());
    assert!(ctx.store.get_all_sources().unwrap().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn failed_cycle_keeps_local_read_and_starred_flags() {
    let mock = common::server(3);
    mock.set_entry_flags(3, false, true);
    let ctx = common::context(&mock);
    assert_ok!(ctx.engine.setup(common::account()).await);
    assert_ok!(ctx.engine.sync().await);

    mock.set_offline(true);
    let err = assert_err!(ctx.engine.sync().await);
    assert!(err.is_service_failure());

    let items = ctx.store.get_all_items().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| !i.is_read));
    let starred: Vec<_> = items
        .iter()
        .filter(|i| i.is_starred)
        .filter_map(|i| i.service_ref.as_deref())
        .collect();
    assert_eq!(starred, vec!["3"]);

    mock.set_offline(false);
    let report = assert_ok!(ctx.engine.sync().await);
    assert_eq!(report.read_changed, 0);
    assert_eq!(report.starred_changed, 0);

    ctx.shutdown().await;
}
