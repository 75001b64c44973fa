//! Miniflux v1 wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub feed_url: String,
    #[serde(default)]
    pub title: String,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub starred: bool,
}

impl Entry {
    pub fn is_read(&self) -> bool {
        self.status == "read"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntriesPage {
    pub total: usize,
    #[serde(default)]
    pub entries: Option<Vec<Entry>>,
}

/// Body of `PUT /v1/entries`.
#[derive(Debug, Serialize)]
pub struct StatusUpdate<'a> {
    pub entry_ids: Vec<i64>,
    pub status: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_decodes_with_missing_optionals() {
        let json = r#"{
            "id": 7, "feed_id": 2, "status": "read", "title": "t",
            "url": "https://a.example/p", "content": "<p>x</p>",
            "author": "", "created_at": "2024-03-01T10:00:00+02:00", "starred": true
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert!(entry.is_read());
        assert!(entry.published_at.is_none());
        assert_eq!(
            entry.created_at.unwrap().to_rfc3339(),
            "2024-03-01T08:00:00+00:00"
        );
    }

    #[test]
    fn test_entries_page_with_null_entries() {
        let page: EntriesPage = serde_json::from_str(r#"{"total": 0, "entries": null}"#).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.entries.is_none());
    }

    #[test]
    fn test_status_update_body() {
        let body = serde_json::to_string(&StatusUpdate {
            entry_ids: vec![1, 2],
            status: "read",
        })
        .unwrap();
        assert_eq!(body, r#"{"entry_ids":[1,2],"status":"read"}"#);
    }
}
