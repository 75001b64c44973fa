//! Miniflux backend.
//!
//! Talks to the Miniflux v1 REST API through a [`Transport`]:
//!
//! - `GET me` to validate credentials
//! - `GET categories`, `GET feeds` for the catalog
//! - `GET entries` (paginated) for new items and remote state
//! - `PUT entries`, `PUT entries/<id>/bookmark`, `PUT feeds/<id>/mark-all-as-read`
//!   for mutations

pub mod api;
pub mod mapper;
pub mod paginate;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use html_escape::decode_html_entities;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::app::{Result, RillError};
use crate::domain::{Group, Item, Source, SourceLookup};
use crate::service::{Catalog, RemoteState, ServiceConfig, ServiceHooks, Transport};
use crate::store::{DateBoundary, Store};

use api::{Category, Feed, StatusUpdate};
use paginate::{fetch_entries, FetchMode};

pub use mapper::{map_entries, MappedBatch};

pub struct MinifluxService {
    transport: Arc<dyn Transport>,
}

impl MinifluxService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn get_json<T: DeserializeOwned>(&self, config: &ServiceConfig, path: &str) -> Result<T> {
        let response = self.transport.call(config, path, Method::GET, None).await?;
        response.json().map_err(|e| {
            RillError::service(format!("Malformed response for {}: {}", path, e))
        })
    }

    async fn put_status(
        &self,
        config: &ServiceConfig,
        entry_ids: Vec<i64>,
        status: &str,
    ) -> Result<u16> {
        let body = serde_json::to_string(&StatusUpdate { entry_ids, status })?;
        let response = self
            .transport
            .call(config, "entries", Method::PUT, Some(body))
            .await?;
        Ok(response.status)
    }

    async fn toggle_bookmark(&self, config: &ServiceConfig, item: &Item, label: &str) {
        let Some(id) = entry_id(item) else {
            return;
        };
        let path = format!("entries/{}/bookmark", id);
        match self.transport.call(config, &path, Method::PUT, None).await {
            Ok(response) if response.is_no_content() => {}
            Ok(response) => warn!("{} of entry {} returned {}", label, id, response.status),
            Err(e) => warn!("{} of entry {} failed: {}", label, id, e),
        }
    }
}

/// Remote id of an item, if it has a usable one.
fn entry_id(item: &Item) -> Option<i64> {
    let service_ref = item.service_ref.as_deref()?;
    match service_ref.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Item {} has non-numeric service ref {:?}", item.id, service_ref);
            None
        }
    }
}

#[async_trait]
impl ServiceHooks for MinifluxService {
    async fn authenticate(&self, config: &ServiceConfig) -> Result<bool> {
        let response = self.transport.call(config, "me", Method::GET, None).await?;
        match response.json::<serde_json::Value>() {
            Ok(body) => Ok(body.get("error_message").is_none()),
            Err(e) => {
                warn!("Undecodable response from {}: {}", config.api_url("me"), e);
                Ok(false)
            }
        }
    }

    async fn import_catalog(&self, config: &ServiceConfig) -> Result<Catalog> {
        let mut groups = Vec::new();
        if config.import_groups {
            let categories: Vec<Category> = self.get_json(config, "categories").await?;
            groups = categories
                .into_iter()
                .map(|c| Group::new(decode_html_entities(&c.title).to_string()))
                .collect();
        }

        let feeds: Vec<Feed> = self.get_json(config, "feeds").await?;
        let mut group_mapping = config.import_groups.then(HashMap::new);

        let sources = feeds
            .into_iter()
            .map(|feed| {
                let service_ref = feed.id.to_string();
                if let (Some(mapping), Some(category)) = (group_mapping.as_mut(), feed.category) {
                    mapping.insert(
                        service_ref.clone(),
                        decode_html_entities(&category.title).to_string(),
                    );
                }
                let mut source = Source::new(feed.feed_url, decode_html_entities(&feed.title).to_string());
                source.service_ref = Some(service_ref);
                source
            })
            .collect::<Vec<_>>();

        info!(
            "Imported {} feeds and {} categories",
            sources.len(),
            groups.len()
        );

        Ok(Catalog {
            sources,
            groups,
            group_mapping,
        })
    }

    async fn fetch_new_items(
        &self,
        config: &mut ServiceConfig,
        sources: &SourceLookup,
    ) -> Result<MappedBatch> {
        let fetched = fetch_entries(self.transport.as_ref(), config, &[], FetchMode::Incremental).await;
        if fetched.truncated {
            warn!("Keeping {} entries from an incomplete fetch", fetched.entries.len());
        }
        let entries = fetched.entries;

        let Some(max_id) = entries.iter().map(|e| e.id).max() else {
            debug!("No new entries above {:?}", config.last_id);
            return Ok(MappedBatch::default());
        };
        config.last_id = Some(config.last_id.map_or(max_id, |last| last.max(max_id)));
        info!("Fetched {} new entries, cursor now {}", entries.len(), max_id);

        Ok(map_entries(entries, sources))
    }

    async fn reconcile_state(&self, config: &ServiceConfig) -> Result<RemoteState> {
        let transport = self.transport.as_ref();
        let (unread, starred) = tokio::join!(
            fetch_entries(transport, config, &[("status", "unread")], FetchMode::Backlog),
            fetch_entries(transport, config, &[("starred", "true")], FetchMode::Backlog),
        );

        // A partial truth set would read as "everything else is read/unstarred".
        if unread.truncated || starred.truncated {
            return Err(RillError::service(
                "Remote state is incomplete, skipping reconciliation",
            ));
        }

        Ok(RemoteState {
            unread: unread.entries.iter().map(|e| e.id.to_string()).collect(),
            starred: starred.entries.iter().map(|e| e.id.to_string()).collect(),
        })
    }

    async fn mark_read(&self, config: &ServiceConfig, item: &Item) -> Result<()> {
        if item.service_ref.is_none() {
            return Ok(());
        }
        let id = entry_id(item).ok_or_else(|| {
            RillError::service(format!("Item {} cannot be addressed remotely", item.id))
        })?;

        let status = self.put_status(config, vec![id], "read").await?;
        if status != 204 {
            return Err(RillError::service(format!(
                "Marking entry {} read returned {}",
                id, status
            )));
        }
        Ok(())
    }

    async fn mark_unread(&self, config: &ServiceConfig, item: &Item) {
        let Some(id) = entry_id(item) else {
            return;
        };
        match self.put_status(config, vec![id], "unread").await {
            Ok(204) => {}
            Ok(status) => warn!("Marking entry {} unread returned {}", id, status),
            Err(e) => warn!("Marking entry {} unread failed: {}", id, e),
        }
    }

    async fn star(&self, config: &ServiceConfig, item: &Item) {
        self.toggle_bookmark(config, item, "Starring").await;
    }

    async fn unstar(&self, config: &ServiceConfig, item: &Item) {
        self.toggle_bookmark(config, item, "Unstarring").await;
    }

    async fn mark_all_read(
        &self,
        config: &ServiceConfig,
        store: &(dyn Store + Sync),
        source_ids: &[i64],
        date: Option<DateTime<Utc>>,
        before: bool,
    ) -> Result<()> {
        if let Some(date) = date {
            let boundary = DateBoundary::new(date, before);
            let ids: Vec<i64> = store
                .unread_service_refs(source_ids, Some(&boundary))?
                .iter()
                .filter_map(|r| r.parse().ok())
                .collect();
            if ids.is_empty() {
                debug!("Nothing to mark read remotely");
                return Ok(());
            }

            let count = ids.len();
            let status = self.put_status(config, ids, "read").await?;
            if status != 204 {
                warn!("Bulk mark read of {} entries returned {}", count, status);
            }
            return Ok(());
        }

        let mut paths = Vec::new();
        for source_id in source_ids {
            match store.get_source(*source_id)?.and_then(|s| s.service_ref) {
                Some(feed_id) => paths.push(format!("feeds/{}/mark-all-as-read", feed_id)),
                None => debug!("Source {} is not linked to a remote feed", source_id),
            }
        }

        let calls = paths
            .iter()
            .map(|path| self.transport.call(config, path, Method::PUT, None));
        for (path, result) in paths.iter().zip(join_all(calls).await) {
            let response = result?;
            if !response.is_no_content() {
                warn!("PUT {} returned {}", path, response.status);
            }
        }

        Ok(())
    }
}
