use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::{PendingCommand, ServiceConfig, ServiceHooks};

/// Message type for the command worker
#[derive(Debug)]
pub enum CommandMessage {
    /// Send a batch of commands using the given account settings
    Execute {
        config: ServiceConfig,
        commands: Vec<PendingCommand>,
    },
    /// Shutdown the worker
    Shutdown,
}

/// Handle to send messages to the command worker
#[derive(Clone)]
pub struct CommandQueueHandle {
    tx: mpsc::Sender<CommandMessage>,
}

impl CommandQueueHandle {
    /// Queue commands for background execution
    pub async fn queue(&self, config: &ServiceConfig, commands: Vec<PendingCommand>) {
        if commands.is_empty() {
            return;
        }
        let message = CommandMessage::Execute {
            config: config.clone(),
            commands,
        };
        if let Err(e) = self.tx.send(message).await {
            warn!("Failed to queue remote commands: {}", e);
        }
    }

    /// Shutdown the command worker once queued work is done
    pub async fn shutdown(&self) {
        let _ = self.tx.send(CommandMessage::Shutdown).await;
    }
}

/// Executes remote commands off the sync path, in the order they were queued.
pub struct CommandWorker {
    service: Arc<dyn ServiceHooks>,
    rx: mpsc::Receiver<CommandMessage>,
}

impl CommandWorker {
    pub fn new(service: Arc<dyn ServiceHooks>) -> (Self, CommandQueueHandle) {
        let (tx, rx) = mpsc::channel(100);
        (Self { service, rx }, CommandQueueHandle { tx })
    }

    pub async fn run(mut self) {
        debug!("Command worker started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                CommandMessage::Execute { config, commands } => {
                    info!("Sending {} queued remote commands", commands.len());
                    for command in &commands {
                        if let Err(e) = self.service.execute(&config, command).await {
                            warn!(
                                "Remote {:?} for item {:?} failed: {}",
                                command.action, command.item.service_ref, e
                            );
                        }
                    }
                }
                CommandMessage::Shutdown => {
                    debug!("Command worker shutting down");
                    break;
                }
            }
        }
    }
}

/// Spawn the command worker as a tokio task
pub fn spawn_command_queue(service: Arc<dyn ServiceHooks>) -> (CommandQueueHandle, JoinHandle<()>) {
    let (worker, handle) = CommandWorker::new(service);
    let task = tokio::spawn(worker.run());
    (handle, task)
}
