//! Sync engine.
//!
//! Ties the local [`Store`] to a [`ServiceHooks`] backend. A cycle pulls new
//! items, persists the cursor, hands rule-driven commands to the background
//! queue and then reconciles local read/starred flags with the remote state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::{Result, RillError};
use crate::domain::Source;
use crate::service::{CommandQueueHandle, RemoteState, ServiceConfig, ServiceHooks};
use crate::store::{DateBoundary, LocalFlags, SettingsStore, Store};

/// A local flag that disagrees with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagChange {
    pub item_id: i64,
    pub read: Option<bool>,
    pub starred: Option<bool>,
}

/// Compare local flags against the remote unread and starred sets.
///
/// An item is read remotely when it is absent from the unread set, starred
/// when present in the starred set. Only drifted items are returned.
pub fn diff_remote_state(local: &[LocalFlags], remote: &RemoteState) -> Vec<FlagChange> {
    local
        .iter()
        .filter_map(|flags| {
            let remote_read = !remote.unread.contains(&flags.service_ref);
            let remote_starred = remote.starred.contains(&flags.service_ref);

            let change = FlagChange {
                item_id: flags.item_id,
                read: (remote_read != flags.is_read).then_some(remote_read),
                starred: (remote_starred != flags.is_starred).then_some(remote_starred),
            };
            (change.read.is_some() || change.starred.is_some()).then_some(change)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub sources_added: usize,
    pub groups_added: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub new_items: usize,
    pub queued_commands: usize,
    pub read_changed: usize,
    pub starred_changed: usize,
}

pub struct SyncEngine<S> {
    store: Arc<S>,
    service: Arc<dyn ServiceHooks>,
    queue: CommandQueueHandle,
}

impl<S> SyncEngine<S>
where
    S: Store + SettingsStore + Send + Sync,
{
    pub fn new(store: Arc<S>, service: Arc<dyn ServiceHooks>, queue: CommandQueueHandle) -> Self {
        Self {
            store,
            service,
            queue,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Settings saved by the last successful [`setup`](Self::setup).
    pub fn service_config(&self) -> Result<ServiceConfig> {
        self.store
            .load_service_config()?
            .ok_or_else(|| RillError::Config("No account configured, run `rill login` first".into()))
    }

    /// Validate credentials, import the remote catalog and remember the account.
    ///
    /// Re-running for the same account keeps the fetch cursor and skips
    /// sources and groups that already exist locally.
    pub async fn setup(&self, mut config: ServiceConfig) -> Result<SetupReport> {
        if !self.service.authenticate(&config).await? {
            return Err(RillError::service(format!(
                "Credentials rejected by {}",
                config.endpoint
            )));
        }

        config.last_id = match self.store.load_service_config()? {
            Some(previous) if previous.same_account(&config) => previous.last_id,
            _ => None,
        };

        let catalog = self.service.import_catalog(&config).await?;
        let mut report = SetupReport::default();

        let mut group_ids: HashMap<String, i64> = self
            .store
            .get_all_groups()?
            .into_iter()
            .map(|g| (g.title, g.id))
            .collect();
        for group in &catalog.groups {
            if !group_ids.contains_key(&group.title) {
                let id = self.store.add_group(group)?;
                group_ids.insert(group.title.clone(), id);
                report.groups_added += 1;
            }
        }

        for mut source in catalog.sources {
            let Some(service_ref) = source.service_ref.clone() else {
                continue;
            };
            if self.store.get_source_by_service_ref(&service_ref)?.is_some() {
                debug!("Source for feed {} already exists", service_ref);
                continue;
            }
            source.group_id = catalog
                .group_mapping
                .as_ref()
                .and_then(|mapping| mapping.get(&service_ref))
                .and_then(|title| group_ids.get(title).copied());
            self.store.add_source(&source)?;
            report.sources_added += 1;
        }

        self.store.save_service_config(&config)?;
        info!(
            "Account ready: {} sources and {} groups added",
            report.sources_added, report.groups_added
        );
        Ok(report)
    }

    /// Run one sync cycle.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut config = self.service_config()?;
        let lookup = Source::lookup(self.store.get_all_sources()?);

        let batch = self.service.fetch_new_items(&mut config, &lookup).await?;
        let new_items = self.store.add_items(&batch.items)?;
        // Cursor only moves once the items it covers are stored.
        self.store.save_service_config(&config)?;

        let pending: HashSet<String> = batch
            .commands
            .iter()
            .filter_map(|c| c.item.service_ref.clone())
            .collect();
        let queued_commands = batch.commands.len();
        self.queue.queue(&config, batch.commands).await;

        let remote = self.service.reconcile_state(&config).await?;
        let mut report = SyncReport {
            new_items,
            queued_commands,
            ..Default::default()
        };

        let local = self.store.synced_flags()?;
        let refs: HashMap<i64, &str> = local
            .iter()
            .map(|f| (f.item_id, f.service_ref.as_str()))
            .collect();

        for change in diff_remote_state(&local, &remote) {
            // Queued commands have not reached the service yet.
            if refs.get(&change.item_id).is_some_and(|r| pending.contains(*r)) {
                continue;
            }
            if let Some(read) = change.read {
                self.store.set_read(change.item_id, read)?;
                report.read_changed += 1;
            }
            if let Some(starred) = change.starred {
                self.store.set_starred(change.item_id, starred)?;
                report.starred_changed += 1;
            }
        }

        info!(
            "Sync complete: {} new items, {} commands queued, {} read and {} starred flags updated",
            report.new_items, report.queued_commands, report.read_changed, report.starred_changed
        );
        Ok(report)
    }

    /// Set the read flag locally, then on the service when the item is linked.
    pub async fn set_read(&self, item_id: i64, read: bool) -> Result<()> {
        let item = self
            .store
            .get_item(item_id)?
            .ok_or_else(|| RillError::ItemNotFound(item_id.to_string()))?;
        self.store.set_read(item_id, read)?;

        let Some(config) = self.linked_config(item.service_ref.is_some())? else {
            return Ok(());
        };
        if read {
            self.service.mark_read(&config, &item).await
        } else {
            self.service.mark_unread(&config, &item).await;
            Ok(())
        }
    }

    /// Set the starred flag locally, then on the service when the item is linked.
    pub async fn set_starred(&self, item_id: i64, starred: bool) -> Result<()> {
        let item = self
            .store
            .get_item(item_id)?
            .ok_or_else(|| RillError::ItemNotFound(item_id.to_string()))?;
        if item.is_starred == starred {
            debug!("Item {} already has starred={}", item_id, starred);
            return Ok(());
        }
        self.store.set_starred(item_id, starred)?;

        // The bookmark endpoint toggles, so only send on an actual change.
        if let Some(config) = self.linked_config(item.service_ref.is_some())? {
            if starred {
                self.service.star(&config, &item).await;
            } else {
                self.service.unstar(&config, &item).await;
            }
        }
        Ok(())
    }

    /// Mark sources read on the service and locally. An empty `source_ids`
    /// means every source. Returns how many local items changed.
    pub async fn mark_all_read(
        &self,
        source_ids: &[i64],
        boundary: Option<DateBoundary>,
    ) -> Result<usize> {
        let source_ids: Vec<i64> = if source_ids.is_empty() {
            self.store.get_all_sources()?.iter().map(|s| s.id).collect()
        } else {
            for id in source_ids {
                if self.store.get_source(*id)?.is_none() {
                    return Err(RillError::SourceNotFound(id.to_string()));
                }
            }
            source_ids.to_vec()
        };

        // The remote side reads the local unread set, so it goes first.
        if let Some(config) = self.store.load_service_config()? {
            let (date, before) = match boundary {
                Some(b) => (Some(b.date), b.before),
                None => (None, false),
            };
            self.service
                .mark_all_read(&config, &*self.store, &source_ids, date, before)
                .await?;
        }

        let changed = self.store.mark_sources_read(&source_ids, boundary.as_ref())?;
        info!("Marked {} items read", changed);
        Ok(changed)
    }

    fn linked_config(&self, linked: bool) -> Result<Option<ServiceConfig>> {
        if !linked {
            return Ok(None);
        }
        let config = self.store.load_service_config()?;
        if config.is_none() {
            warn!("Item is linked to a service but no account is configured");
        }
        Ok(config)
    }
}
