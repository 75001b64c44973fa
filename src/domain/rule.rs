//! Per-source automation rules.
//!
//! A rule pairs a text filter with a set of flag overrides. Rules run in order
//! on freshly mapped items and may flip read, starred, hidden or notify.

use serde::{Deserialize, Serialize};

use crate::domain::Item;

/// Which item fields a filter searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    Title,
    TitleAndContent,
    Author,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleFilter {
    /// Substring to look for. Empty matches every item.
    pub search: String,
    pub scope: SearchScope,
    pub case_sensitive: bool,
}

impl RuleFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if self.search.is_empty() {
            return true;
        }

        let haystack = match self.scope {
            SearchScope::Title => item.title.clone(),
            SearchScope::TitleAndContent => format!("{}\n{}", item.title, item.snippet),
            SearchScope::Author => item.author.clone().unwrap_or_default(),
        };

        if self.case_sensitive {
            haystack.contains(&self.search)
        } else {
            haystack
                .to_lowercase()
                .contains(&self.search.to_lowercase())
        }
    }
}

/// Flag overrides. `None` leaves the flag alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleActions {
    pub read: Option<bool>,
    pub starred: Option<bool>,
    pub hidden: Option<bool>,
    pub notify: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRule {
    pub filter: RuleFilter,
    /// Fire when the filter result equals this value; `false` inverts the filter.
    #[serde(rename = "match", default = "default_match")]
    pub match_filter: bool,
    pub actions: RuleActions,
}

fn default_match() -> bool {
    true
}

impl SourceRule {
    pub fn new(filter: RuleFilter, actions: RuleActions) -> Self {
        Self {
            filter,
            match_filter: true,
            actions,
        }
    }

    pub fn apply(&self, item: &mut Item) {
        if self.filter.matches(item) != self.match_filter {
            return;
        }

        if let Some(read) = self.actions.read {
            item.is_read = read;
        }
        if let Some(starred) = self.actions.starred {
            item.is_starred = starred;
        }
        if let Some(hidden) = self.actions.hidden {
            item.is_hidden = hidden;
        }
        if let Some(notify) = self.actions.notify {
            item.notify = notify;
        }
    }
}

/// Run every rule in order against a copy of `item`.
pub fn apply_all(rules: &[SourceRule], item: &Item) -> Item {
    let mut out = item.clone();
    for rule in rules {
        rule.apply(&mut out);
    }
    out
}
