use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SourceRule;

/// Sources keyed by their remote feed id.
pub type SourceLookup = HashMap<String, Source>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub name: String,
    /// Remote feed id. Stable once assigned.
    pub service_ref: Option<String>,
    pub group_id: Option<i64>,
    pub rules: Vec<SourceRule>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn new(url: String, name: String) -> Self {
        Self {
            id: 0,
            url,
            name,
            service_ref: None,
            group_id: None,
            rules: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    /// Build a lookup of the sources that are linked to a remote feed.
    pub fn lookup<I: IntoIterator<Item = Source>>(sources: I) -> SourceLookup {
        sources
            .into_iter()
            .filter_map(|s| s.service_ref.clone().map(|r| (r, s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_url() {
        let source = Source::new("https://example.com/feed.xml".into(), String::new());
        assert_eq!(source.display_name(), "https://example.com/feed.xml");
    }

    #[test]
    fn test_lookup_skips_unlinked_sources() {
        let mut linked = Source::new("https://a.example/feed".into(), "A".into());
        linked.service_ref = Some("12".into());
        let unlinked = Source::new("https://b.example/feed".into(), "B".into());

        let lookup = Source::lookup(vec![linked, unlinked]);
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup["12"].name, "A");
    }
}
