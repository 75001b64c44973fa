//! In-memory Miniflux server for tests.
//!
//! [`MockMiniflux`] implements [`Transport`] by answering requests from an
//! in-memory entry set, so sync code can be exercised without a network.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde_json::{json, Value};

use crate::app::{Result, RillError};
use crate::service::miniflux::api::Entry;
use crate::service::{ServiceConfig, ServiceResponse, Transport};

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub auth_header: (&'static str, String),
}

impl RecordedRequest {
    /// Value of a query parameter, if present.
    pub fn query(&self, key: &str) -> Option<String> {
        let (_, query) = self.path.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn route(&self) -> &str {
        self.path.split_once('?').map_or(&self.path, |(r, _)| r)
    }
}

#[derive(Default)]
struct MockState {
    entries: Vec<Entry>,
    feeds: Vec<Value>,
    categories: Vec<Value>,
    reject_credentials: bool,
    offline: bool,
    malformed_feeds: bool,
    /// Number of successful entry-page responses before pages start failing.
    page_budget: Option<usize>,
    /// Status returned for `PUT entries`, 204 unless overridden.
    status_update_code: Option<u16>,
    requests: Vec<RecordedRequest>,
}

#[derive(Default)]
pub struct MockMiniflux {
    state: Mutex<MockState>,
}

impl MockMiniflux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry with deterministic timestamps: entry `id` was published `id` hours
    /// after 2024-01-01T00:00:00Z.
    pub fn make_entry(id: i64, feed_id: i64) -> Entry {
        let published = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .map(|base| base + chrono::Duration::hours(id));
        Entry {
            id,
            feed_id,
            status: "unread".into(),
            title: format!("Entry {}", id),
            url: format!("https://site{}.example/posts/{}", feed_id, id),
            content: format!("<p>Body of entry {}</p>", id),
            author: Some("Ferris".into()),
            published_at: published,
            created_at: published,
            starred: false,
        }
    }

    pub fn with_entries<I: IntoIterator<Item = Entry>>(self, entries: I) -> Self {
        self.lock().entries.extend(entries);
        self
    }

    pub fn with_category(self, id: i64, title: &str) -> Self {
        self.lock().categories.push(json!({ "id": id, "title": title }));
        self
    }

    pub fn with_feed(self, id: i64, url: &str, title: &str, category: Option<(i64, &str)>) -> Self {
        let category = category.map(|(cid, ctitle)| json!({ "id": cid, "title": ctitle }));
        self.lock().feeds.push(json!({
            "id": id,
            "feed_url": url,
            "title": title,
            "category": category,
        }));
        self
    }

    pub fn reject_credentials(self) -> Self {
        self.lock().reject_credentials = true;
        self
    }

    pub fn malformed_feeds(self) -> Self {
        self.lock().malformed_feeds = true;
        self
    }

    pub fn fail_pages_after(self, pages: usize) -> Self {
        self.lock().page_budget = Some(pages);
        self
    }

    pub fn with_status_update_code(self, code: u16) -> Self {
        self.lock().status_update_code = Some(code);
        self
    }

    /// Let `pages` more entry pages succeed, then fail the rest.
    pub fn set_page_budget(&self, pages: usize) {
        self.lock().page_budget = Some(pages);
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn add_entry(&self, entry: Entry) {
        self.lock().entries.push(entry);
    }

    pub fn set_entry_flags(&self, id: i64, read: bool, starred: bool) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) {
            entry.status = if read { "read" } else { "unread" }.into();
            entry.starred = starred;
        }
    }

    pub fn entry(&self, id: i64) -> Option<Entry> {
        self.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a panicking test; keep serving.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn json_response(status: u16, value: Value) -> ServiceResponse {
    ServiceResponse::new(status, value.to_string().into_bytes())
}

fn no_content() -> ServiceResponse {
    ServiceResponse::new(204, Vec::new())
}

fn not_found() -> ServiceResponse {
    json_response(404, json!({ "error_message": "Not Found" }))
}

impl MockState {
    fn list_entries(&mut self, query: &str) -> Result<ServiceResponse> {
        if let Some(budget) = self.page_budget.as_mut() {
            if *budget == 0 {
                return Ok(ServiceResponse::new(500, b"internal error".to_vec()));
            }
            *budget -= 1;
        }

        let mut limit = usize::MAX;
        let mut matching: Vec<&Entry> = self.entries.iter().collect();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "limit" => limit = value.parse().unwrap_or(usize::MAX),
                "status" => matching.retain(|e| e.status == value),
                "starred" => {
                    let starred = value == "true";
                    matching.retain(|e| e.starred == starred)
                }
                "after_entry_id" => {
                    let after: i64 = value.parse().unwrap_or(i64::MIN);
                    matching.retain(|e| e.id > after)
                }
                "before_entry_id" => {
                    let before: i64 = value.parse().unwrap_or(i64::MAX);
                    matching.retain(|e| e.id < before)
                }
                _ => {}
            }
        }

        matching.sort_by(|a, b| b.id.cmp(&a.id));
        let total = matching.len();
        let page: Vec<&Entry> = matching.into_iter().take(limit).collect();
        Ok(json_response(200, json!({ "total": total, "entries": page })))
    }

    fn update_status(&mut self, body: Option<&str>) -> ServiceResponse {
        let update = body.and_then(decode_status_update);

        let Some((ids, status)) = update else {
            return json_response(400, json!({ "error_message": "Invalid JSON" }));
        };
        if ids.is_empty() {
            return json_response(400, json!({ "error_message": "The list of entry IDs is empty" }));
        }

        for entry in self.entries.iter_mut().filter(|e| ids.contains(&e.id)) {
            entry.status = status.clone();
        }

        match self.status_update_code {
            Some(code) => ServiceResponse::new(code, Vec::new()),
            None => no_content(),
        }
    }

    fn route(&mut self, method: &Method, route: &str, query: &str, body: Option<&str>) -> Result<ServiceResponse> {
        let segments: Vec<&str> = route.split('/').collect();
        let response = match (method.as_str(), segments.as_slice()) {
            ("GET", ["me"]) => json_response(200, json!({ "id": 1, "username": "admin" })),
            ("GET", ["categories"]) => json_response(200, Value::Array(self.categories.clone())),
            ("GET", ["feeds"]) if self.malformed_feeds => {
                ServiceResponse::new(200, b"<html>gateway</html>".to_vec())
            }
            ("GET", ["feeds"]) => json_response(200, Value::Array(self.feeds.clone())),
            ("GET", ["entries"]) => return self.list_entries(query),
            ("PUT", ["entries"]) => self.update_status(body),
            ("PUT", ["entries", id, "bookmark"]) => {
                let id: i64 = id.parse().unwrap_or_default();
                match self.entries.iter_mut().find(|e| e.id == id) {
                    Some(entry) => {
                        entry.starred = !entry.starred;
                        no_content()
                    }
                    None => not_found(),
                }
            }
            ("PUT", ["feeds", id, "mark-all-as-read"]) => {
                let id: i64 = id.parse().unwrap_or_default();
                for entry in self.entries.iter_mut().filter(|e| e.feed_id == id) {
                    entry.status = "read".into();
                }
                no_content()
            }
            _ => not_found(),
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for MockMiniflux {
    async fn call(
        &self,
        config: &ServiceConfig,
        path: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<ServiceResponse> {
        let mut state = self.lock();
        if state.offline {
            return Err(RillError::service("Network error"));
        }

        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            body: body.clone(),
            auth_header: config.auth.header(),
        });

        if state.reject_credentials {
            return Ok(json_response(401, json!({ "error_message": "Access Unauthorized" })));
        }

        let (route, query) = path.split_once('?').unwrap_or((path, ""));
        state.route(&method, route, query, body.as_deref())
    }
}

/// Decode a recorded `PUT entries` body.
pub fn decode_status_update(body: &str) -> Option<(Vec<i64>, String)> {
    let value: Value = serde_json::from_str(body).ok()?;
    let ids = value["entry_ids"]
        .as_array()?
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    Some((ids, value["status"].as_str()?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::miniflux::api::StatusUpdate;
    use crate::service::AuthMode;

    fn config() -> ServiceConfig {
        ServiceConfig::new("https://flux.example", AuthMode::default())
    }

    #[tokio::test]
    async fn test_entries_filtering_and_total() {
        let mock = MockMiniflux::new().with_entries((1..=6).map(|id| MockMiniflux::make_entry(id, 1)));

        let response = mock
            .call(&config(), "entries?limit=2&order=id&direction=desc&before_entry_id=5", Method::GET, None)
            .await
            .unwrap();
        let page: Value = response.json().unwrap();

        assert_eq!(page["total"], 4);
        let ids: Vec<i64> = page["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_bookmark_toggles() {
        let mock = MockMiniflux::new().with_entries([MockMiniflux::make_entry(3, 1)]);
        mock.call(&config(), "entries/3/bookmark", Method::PUT, None)
            .await
            .unwrap();
        assert!(mock.entry(3).unwrap().starred);
    }

    #[test]
    fn test_status_update_roundtrip() {
        let body = serde_json::to_string(&StatusUpdate {
            entry_ids: vec![4],
            status: "unread",
        })
        .unwrap();
        assert_eq!(decode_status_update(&body), Some((vec![4], "unread".to_string())));
    }
}
