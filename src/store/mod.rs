pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Group, Item, Source, SourceRule};
use crate::service::ServiceConfig;

pub use sqlite::SqliteStore;

/// One side of a date, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBoundary {
    pub date: DateTime<Utc>,
    /// `true` keeps dates at or before `date`, `false` at or after it.
    pub before: bool,
}

impl DateBoundary {
    pub fn new(date: DateTime<Utc>, before: bool) -> Self {
        Self { date, before }
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        if self.before {
            date <= self.date
        } else {
            date >= self.date
        }
    }
}

/// Local flags of an item that exists remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFlags {
    pub item_id: i64,
    pub service_ref: String,
    pub is_read: bool,
    pub is_starred: bool,
}

pub trait Store {
    // Source operations
    fn add_source(&self, source: &Source) -> Result<i64>;
    fn get_source(&self, id: i64) -> Result<Option<Source>>;
    fn get_source_by_service_ref(&self, service_ref: &str) -> Result<Option<Source>>;
    fn get_all_sources(&self) -> Result<Vec<Source>>;
    fn set_source_rules(&self, source_id: i64, rules: &[SourceRule]) -> Result<()>;

    // Group operations
    fn add_group(&self, group: &Group) -> Result<i64>;
    fn get_all_groups(&self) -> Result<Vec<Group>>;

    // Item operations
    fn add_items(&self, items: &[Item]) -> Result<usize>;
    fn get_item(&self, id: i64) -> Result<Option<Item>>;
    fn get_item_by_service_ref(&self, service_ref: &str) -> Result<Option<Item>>;
    fn get_items_by_source(&self, source_id: i64) -> Result<Vec<Item>>;
    fn get_all_items(&self) -> Result<Vec<Item>>;

    // State operations
    fn set_read(&self, item_id: i64, is_read: bool) -> Result<()>;
    fn set_starred(&self, item_id: i64, is_starred: bool) -> Result<()>;
    fn get_unread_count(&self, source_id: i64) -> Result<i64>;
    /// Mark unread items of `source_ids` read locally. Returns how many changed.
    fn mark_sources_read(&self, source_ids: &[i64], boundary: Option<&DateBoundary>) -> Result<usize>;
    /// Service refs of unread items in `source_ids`, optionally date-bounded.
    fn unread_service_refs(&self, source_ids: &[i64], boundary: Option<&DateBoundary>) -> Result<Vec<String>>;
    /// Flags of every item that has a service ref.
    fn synced_flags(&self) -> Result<Vec<LocalFlags>>;
}

/// Persistence for the service settings, including the fetch cursor.
pub trait SettingsStore {
    fn load_service_config(&self) -> Result<Option<ServiceConfig>>;
    fn save_service_config(&self, config: &ServiceConfig) -> Result<()>;
}
