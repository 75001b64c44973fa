//! Remote service backends.
//!
//! [`ServiceHooks`] is the capability set a sync backend offers. The scheduler
//! and [`SyncEngine`](crate::sync::SyncEngine) only talk to this trait;
//! [`MinifluxService`](miniflux::MinifluxService) is the Miniflux implementation.

pub mod miniflux;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod queue;
pub mod transport;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::{Group, Item, Source, SourceLookup};
use crate::store::Store;

pub use miniflux::{MappedBatch, MinifluxService};
pub use queue::{spawn_command_queue, CommandQueueHandle};
pub use transport::{HttpTransport, ServiceResponse, Transport};

pub const DEFAULT_PAGE_SIZE: usize = 125;
pub const DEFAULT_FETCH_LIMIT: usize = 250;

/// How requests authenticate against the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    Token { token: String },
    Basic { username: String, password: String },
}

impl Default for AuthMode {
    fn default() -> Self {
        Self::Token {
            token: String::new(),
        }
    }
}

impl AuthMode {
    /// The single header carrying credentials on every request, name in lowercase.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::Token { token } => ("x-auth-token", token.clone()),
            Self::Basic { username, password } => (
                "authorization",
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
            ),
        }
    }
}

/// Connection settings plus the incremental fetch cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub auth: AuthMode,
    pub page_size: usize,
    /// Soft cap on entries gathered per paginated query.
    pub fetch_limit: usize,
    /// Highest remote entry id seen by an incremental fetch.
    pub last_id: Option<i64>,
    pub import_groups: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth: AuthMode::default(),
            page_size: DEFAULT_PAGE_SIZE,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            last_id: None,
            import_groups: true,
        }
    }
}

impl ServiceConfig {
    pub fn new(endpoint: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth,
            ..Default::default()
        }
    }

    /// Absolute URL of an API path, e.g. `entries` -> `<endpoint>/v1/entries`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// True when both configs address the same account.
    pub fn same_account(&self, other: &ServiceConfig) -> bool {
        self.endpoint.trim_end_matches('/') == other.endpoint.trim_end_matches('/')
            && self.auth == other.auth
    }
}

/// Remote feeds and categories mapped to local records.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub sources: Vec<Source>,
    pub groups: Vec<Group>,
    /// Remote feed id -> category title. Only present when group import is on.
    pub group_mapping: Option<HashMap<String, String>>,
}

/// Remote ids the service currently reports as unread and starred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    pub unread: HashSet<String>,
    pub starred: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    MarkRead,
    MarkUnread,
    Star,
    Unstar,
}

/// A remote mutation decided locally but not yet sent.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub action: CommandAction,
    pub item: Item,
}

impl PendingCommand {
    pub fn new(action: CommandAction, item: Item) -> Self {
        Self { action, item }
    }
}

#[async_trait]
pub trait ServiceHooks: Send + Sync {
    /// Check the credentials. A rejection is `Ok(false)`, not an error.
    async fn authenticate(&self, config: &ServiceConfig) -> Result<bool>;

    async fn import_catalog(&self, config: &ServiceConfig) -> Result<Catalog>;

    /// Fetch entries newer than `config.last_id` and advance the cursor.
    async fn fetch_new_items(
        &self,
        config: &mut ServiceConfig,
        sources: &SourceLookup,
    ) -> Result<MappedBatch>;

    /// Complete unread and starred sets. Fails rather than return a partial set.
    async fn reconcile_state(&self, config: &ServiceConfig) -> Result<RemoteState>;

    async fn mark_read(&self, config: &ServiceConfig, item: &Item) -> Result<()>;

    async fn mark_unread(&self, config: &ServiceConfig, item: &Item);

    /// Star a remote entry.
    ///
    /// Not idempotent on Miniflux: the bookmark endpoint toggles, so starring
    /// an already starred entry unstars it. Only call this when the entry is
    /// known to be unstarred remotely.
    async fn star(&self, config: &ServiceConfig, item: &Item);

    /// Unstar a remote entry. Toggles like [`star`](Self::star), so only call
    /// it when the entry is known to be starred remotely.
    async fn unstar(&self, config: &ServiceConfig, item: &Item);

    /// Mark the given local sources read remotely. With a `date`, only unread
    /// items on the `before` (or after) side of it, inclusive.
    async fn mark_all_read(
        &self,
        config: &ServiceConfig,
        store: &(dyn Store + Sync),
        source_ids: &[i64],
        date: Option<DateTime<Utc>>,
        before: bool,
    ) -> Result<()>;

    async fn execute(&self, config: &ServiceConfig, command: &PendingCommand) -> Result<()> {
        match command.action {
            CommandAction::MarkRead => self.mark_read(config, &command.item).await?,
            CommandAction::MarkUnread => self.mark_unread(config, &command.item).await,
            CommandAction::Star => self.star(config, &command.item).await,
            CommandAction::Unstar => self.unstar(config, &command.item).await,
        }
        Ok(())
    }
}
