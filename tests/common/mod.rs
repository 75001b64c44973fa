use std::sync::Arc;

use rill::app::AppContext;
use rill::service::mock::MockMiniflux;
use rill::service::{AuthMode, ServiceConfig};
use rill::store::SqliteStore;

pub fn account() -> ServiceConfig {
    let mut config = ServiceConfig::new(
        "https://flux.example",
        AuthMode::Token {
            token: "integration".into(),
        },
    );
    config.page_size = 2;
    config
}

/// A server with two feeds in one category and `entries` entries on feed 10.
pub fn server(entries: i64) -> Arc<MockMiniflux> {
    Arc::new(
        MockMiniflux::new()
            .with_category(1, "Rust")
            .with_feed(10, "https://blog.example/rss", "Blog", Some((1, "Rust")))
            .with_feed(11, "https://news.example/rss", "News", Some((1, "Rust")))
            .with_entries((1..=entries).map(|id| MockMiniflux::make_entry(id, 10))),
    )
}

pub fn context(mock: &Arc<MockMiniflux>) -> AppContext {
    let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
    AppContext::with_parts(store, mock.clone())
}
