//! # rill
//!
//! Keeps a local SQLite feed database in sync with a Miniflux server.
//!
//! ## Architecture
//!
//! ```text
//! Transport → MinifluxService → SyncEngine → Store
//!                    ↑               │
//!                    └─ CommandQueue ┘
//! ```
//!
//! - [`service`]: the [`ServiceHooks`](service::ServiceHooks) backend trait and
//!   its Miniflux implementation
//! - [`sync`]: one sync cycle: fetch, store, push rule commands, reconcile
//! - [`store`]: SQLite persistence layer
//! - [`scheduler`]: periodic sync until ctrl-c
//!
//! ## Quick Start
//!
//! ```bash
//! # Fill in [service] in ~/.config/rill/config.toml, then
//! rill login
//!
//! # Pull new items and remote read/starred state
//! rill sync
//!
//! # Keep syncing in the foreground
//! rill sync --watch
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// HTTP transport, Miniflux service, command queue and sync engine.
pub mod app;

/// Command-line interface using clap.
///
/// - `login` / `import` - Authenticate and import feeds and categories
/// - `sync [--watch]` - Run one cycle or keep syncing
/// - `list [--items]` - List sources or items
/// - `read|unread|star|unstar <id>` - Change one item
/// - `read-all` - Mark sources read, optionally date-bounded
pub mod cli;

/// Configuration loaded from `~/.config/rill/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Source`](domain::Source): a feed, linked to a remote feed id
/// - [`Group`](domain::Group): a folder of sources
/// - [`Item`](domain::Item): a stored entry with its flags
/// - [`SourceRule`](domain::SourceRule): filter plus flag overrides applied on import
pub mod domain;

/// Interval loop driving [`SyncEngine::sync`](sync::SyncEngine::sync).
pub mod scheduler;

/// Remote service backends.
pub mod service;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SettingsStore`](store::SettingsStore): account settings and fetch cursor
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Sync cycle and user-facing state changes.
pub mod sync;
