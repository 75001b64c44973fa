use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::app::error::{Result, RillError};
use crate::service::{
    spawn_command_queue, CommandQueueHandle, HttpTransport, MinifluxService, ServiceHooks,
    Transport,
};
use crate::store::sqlite::SqliteStore;
use crate::sync::SyncEngine;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub engine: Arc<SyncEngine<SqliteStore>>,
    queue: CommandQueueHandle,
    worker: JoinHandle<()>,
}

impl AppContext {
    /// Must be called inside a tokio runtime; the command worker is spawned here.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Ok(Self::with_parts(store, transport))
    }

    /// Wire a context from an existing store and transport.
    pub fn with_parts(store: Arc<SqliteStore>, transport: Arc<dyn Transport>) -> Self {
        let service: Arc<dyn ServiceHooks> = Arc::new(MinifluxService::new(transport));
        let (queue, worker) = spawn_command_queue(service.clone());
        let engine = Arc::new(SyncEngine::new(store.clone(), service, queue.clone()));

        Self {
            store,
            engine,
            queue,
            worker,
        }
    }

    /// Let queued remote commands finish, then stop the worker.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
        if let Err(e) = self.worker.await {
            warn!("Command worker ended abnormally: {}", e);
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RillError::Config("Could not find data directory".into()))?;
        let rill_dir = data_dir.join("rill");
        std::fs::create_dir_all(&rill_dir)?;
        Ok(rill_dir.join("rill.db"))
    }
}
