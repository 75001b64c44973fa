//! Cursor-based entry pagination.
//!
//! Entries are requested newest first (`order=id&direction=desc`). The first
//! page is either the newest page (backlog) or the page just above the
//! persisted `last_id` (incremental). Each following page asks for entries
//! strictly older than the last one gathered so far.
//!
//! A failed or undecodable page ends the walk and whatever was gathered is
//! returned with [`FetchedEntries::truncated`] set. Callers decide whether a
//! partial result is usable: new items are, truth sets for reconciliation
//! are not.

use reqwest::Method;
use tracing::{debug, warn};

use crate::app::{Result, RillError};
use crate::service::miniflux::api::{EntriesPage, Entry};
use crate::service::{ServiceConfig, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Only entries above `ServiceConfig::last_id`.
    Incremental,
    /// Everything, walking back from the newest entry.
    Backlog,
}

/// Result of one paginated walk.
#[derive(Debug, Clone, Default)]
pub struct FetchedEntries {
    pub entries: Vec<Entry>,
    /// The walk stopped on a failed page, so `entries` may be incomplete.
    pub truncated: bool,
}

/// Gather entries matching `query`, newest first.
///
/// Stops on an empty page, a short page (`total < page_size`), once at least
/// `fetch_limit` entries are gathered, or on the first failed page. The
/// result can overshoot `fetch_limit` by up to one page.
pub async fn fetch_entries(
    transport: &dyn Transport,
    config: &ServiceConfig,
    query: &[(&str, &str)],
    mode: FetchMode,
) -> FetchedEntries {
    let page_size = config.page_size.max(1);
    let mut entries: Vec<Entry> = Vec::new();
    let mut cursor: Option<i64> = None;
    let mut truncated = false;

    loop {
        let path = entries_path(config, query, mode, cursor, page_size);
        let page = match fetch_page(transport, config, &path).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "Stopping pagination after {} entries, page failed: {}",
                    entries.len(),
                    e
                );
                truncated = true;
                break;
            }
        };

        let total = page.total;
        let page_entries = page.entries.unwrap_or_default();
        if page_entries.is_empty() {
            break;
        }
        let page_last = page_entries.last().map(|e| e.id);
        debug!("Fetched page of {} entries (total {})", page_entries.len(), total);

        entries.extend(page_entries);
        cursor = match mode {
            FetchMode::Incremental => entries.last().map(|e| e.id),
            FetchMode::Backlog => page_last,
        };

        if total < page_size || entries.len() >= config.fetch_limit {
            break;
        }
    }

    FetchedEntries { entries, truncated }
}

async fn fetch_page(
    transport: &dyn Transport,
    config: &ServiceConfig,
    path: &str,
) -> Result<EntriesPage> {
    let response = transport.call(config, path, Method::GET, None).await?;
    if !(200..300).contains(&response.status) {
        return Err(RillError::service(format!(
            "entries request returned {}",
            response.status
        )));
    }
    response.json()
}

fn entries_path(
    config: &ServiceConfig,
    query: &[(&str, &str)],
    mode: FetchMode,
    cursor: Option<i64>,
    page_size: usize,
) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    params
        .append_pair("limit", &page_size.to_string())
        .append_pair("order", "id")
        .append_pair("direction", "desc");

    if let Some(before) = cursor {
        params.append_pair("before_entry_id", &before.to_string());
    }
    // Incremental pages stay above the persisted cursor, first page or not.
    if mode == FetchMode::Incremental {
        if let Some(after) = config.last_id {
            params.append_pair("after_entry_id", &after.to_string());
        }
    }
    for (key, value) in query {
        params.append_pair(key, value);
    }

    format!("entries?{}", params.finish())
}
