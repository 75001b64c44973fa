//! Periodic sync loop.
//!
//! Runs [`SyncEngine::sync`] on a fixed interval until ctrl-c. A failed cycle
//! is logged and the loop keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{error, info};

use crate::store::{SettingsStore, Store};
use crate::sync::SyncEngine;

pub const DEFAULT_INTERVAL_SECS: u64 = 1800;

/// Parse interval string like "1h", "30m", "90s", "1d" or raw seconds.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
    }?;

    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(Duration::from_secs(secs))
}

/// Format interval for display
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Run a cycle immediately instead of waiting one interval.
    pub sync_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            sync_on_start: true,
        }
    }
}

pub struct Scheduler<S> {
    engine: Arc<SyncEngine<S>>,
    config: SchedulerConfig,
}

impl<S> Scheduler<S>
where
    S: Store + SettingsStore + Send + Sync,
{
    pub fn new(engine: Arc<SyncEngine<S>>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run until ctrl-c.
    pub async fn run(&self) -> usize {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves. Returns the number of cycles started.
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) -> usize {
        tokio::pin!(shutdown);
        info!(
            "Scheduler started (interval: {})",
            format_interval(self.config.interval)
        );

        let mut cycles = 0;
        if self.config.sync_on_start {
            self.run_cycle().await;
            cycles += 1;
        }

        let mut timer = interval(self.config.interval);
        timer.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    self.run_cycle().await;
                    cycles += 1;
                }
            }
        }

        info!("Scheduler stopped after {} cycles", cycles);
        cycles
    }

    async fn run_cycle(&self) {
        let start = Instant::now();
        match self.engine.sync().await {
            Ok(report) => info!(
                "Cycle finished in {:.1}s: {} new items",
                start.elapsed().as_secs_f64(),
                report.new_items
            ),
            Err(e) => error!("Sync cycle failed: {}", e),
        }
    }
}
