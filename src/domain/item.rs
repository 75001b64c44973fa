use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub date: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub content: String,
    pub snippet: String,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_hidden: bool,
    pub notify: bool,
    /// Remote entry id. Items without one cannot be addressed remotely.
    pub service_ref: Option<String>,
}

impl Item {
    pub fn new(source_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            source_id,
            title: String::new(),
            link: String::new(),
            date: now,
            fetched_at: now,
            content: String::new(),
            snippet: String::new(),
            author: None,
            thumbnail: None,
            is_read: false,
            is_starred: false,
            is_hidden: false,
            notify: false,
            service_ref: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_unread_and_unlinked() {
        let item = Item::new(3);
        assert_eq!(item.source_id, 3);
        assert!(!item.is_read);
        assert!(!item.is_starred);
        assert!(item.service_ref.is_none());
    }

    #[test]
    fn test_display_title_with_title() {
        let mut item = Item::new(1);
        item.title = "My Article".into();
        assert_eq!(item.display_title(), "My Article");
    }

    #[test]
    fn test_display_title_without_title() {
        let item = Item::new(1);
        assert_eq!(item.display_title(), "(Untitled)");
    }
}
