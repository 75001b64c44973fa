use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::app::{AppContext, Result, RillError};
use crate::config::{AuthKind, Config, ServiceSection};
use crate::scheduler::{format_interval, Scheduler};
use crate::store::{DateBoundary, Store};

pub async fn login(
    ctx: &AppContext,
    config: &Config,
    endpoint: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let mut section = config.service.clone();
    apply_login_overrides(&mut section, endpoint, token);

    let service_config = section.to_service_config()?;
    println!("Logging in to {}...", service_config.endpoint);
    let report = ctx.engine.setup(service_config).await?;
    println!(
        "Logged in: {} sources and {} groups imported",
        report.sources_added, report.groups_added
    );
    Ok(())
}

/// Fold `login` flags into the configured account. A token always means
/// token auth, whatever `service.auth` says.
fn apply_login_overrides(section: &mut ServiceSection, endpoint: Option<String>, token: Option<String>) {
    if let Some(endpoint) = endpoint {
        section.endpoint = endpoint;
    }
    if let Some(token) = token {
        section.auth = AuthKind::Token;
        section.token = token;
    }
}

pub async fn import(ctx: &AppContext) -> Result<()> {
    let service_config = ctx.engine.service_config()?;
    let report = ctx.engine.setup(service_config).await?;
    println!(
        "Import complete: {} new sources, {} new groups",
        report.sources_added, report.groups_added
    );
    Ok(())
}

pub async fn sync(ctx: &AppContext, config: &Config, watch: bool) -> Result<()> {
    if !watch {
        let report = ctx.engine.sync().await?;
        println!(
            "Sync complete: {} new items, {} read and {} starred flags updated",
            report.new_items, report.read_changed, report.starred_changed
        );
        return Ok(());
    }

    let scheduler_config = config.sync.scheduler_config()?;
    // Fail early rather than logging the same error every interval.
    ctx.engine.service_config()?;
    println!(
        "Syncing every {} (ctrl-c to stop)",
        format_interval(scheduler_config.interval)
    );
    let cycles = Scheduler::new(ctx.engine.clone(), scheduler_config).run().await;
    println!("Stopped after {} cycles", cycles);
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.store.get_all_sources()?;

    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    let groups: HashMap<i64, String> = ctx
        .store
        .get_all_groups()?
        .into_iter()
        .map(|g| (g.id, g.title))
        .collect();

    for source in sources {
        let unread = ctx.store.get_unread_count(source.id)?;
        let group = source
            .group_id
            .and_then(|id| groups.get(&id))
            .map(|title| format!(" [{}]", title))
            .unwrap_or_default();
        println!(
            "{:>4} {}{} ({} unread)\n     {}",
            source.id,
            source.display_name(),
            group,
            unread,
            source.url
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext, source: Option<i64>) -> Result<()> {
    let items = match source {
        Some(id) => {
            if ctx.store.get_source(id)?.is_none() {
                return Err(RillError::SourceNotFound(id.to_string()));
            }
            ctx.store.get_items_by_source(id)?
        }
        None => ctx.store.get_all_items()?,
    };
    let visible: Vec<_> = items.into_iter().filter(|i| !i.is_hidden).collect();

    if visible.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in visible {
        let read_marker = if item.is_read { " " } else { "●" };
        let star_marker = if item.is_starred { "★" } else { " " };
        println!(
            "{:>6} {}{} {} {}",
            item.id,
            read_marker,
            star_marker,
            item.date.format("%Y-%m-%d"),
            item.display_title()
        );
    }

    Ok(())
}

pub async fn set_read(ctx: &AppContext, id: i64, read: bool) -> Result<()> {
    ctx.engine.set_read(id, read).await?;
    println!("Item {} marked {}", id, if read { "read" } else { "unread" });
    Ok(())
}

pub async fn set_starred(ctx: &AppContext, id: i64, starred: bool) -> Result<()> {
    ctx.engine.set_starred(id, starred).await?;
    println!("Item {} {}", id, if starred { "starred" } else { "unstarred" });
    Ok(())
}

pub async fn read_all(
    ctx: &AppContext,
    sources: &[i64],
    before: Option<&str>,
    after: Option<&str>,
) -> Result<()> {
    let boundary = match (before, after) {
        (Some(date), _) => Some(parse_boundary(date, true)?),
        (None, Some(date)) => Some(parse_boundary(date, false)?),
        (None, None) => None,
    };

    let changed = ctx.engine.mark_all_read(sources, boundary).await?;
    println!("Marked {} items read", changed);
    Ok(())
}

/// Parse a `--before`/`--after` value. A bare date covers that whole day.
pub fn parse_boundary(value: &str, before: bool) -> Result<DateBoundary> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(DateBoundary::new(dt.with_timezone(&Utc), before));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RillError::Other(format!("Invalid date: {}", value)))?;
    let time = if before {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| RillError::Other(format!("Invalid date: {}", value)))?;

    Ok(DateBoundary::new(date.and_time(time).and_utc(), before))
}
