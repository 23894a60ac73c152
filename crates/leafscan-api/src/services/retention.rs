//! Background service that evicts expired artifacts from the storage directory.

use std::time::Duration;

use leafscan_storage::{FileStore, StorageConfig, SweepReport};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::metrics;

/// Periodic TTL sweeper.
pub struct RetentionSweeper {
    store: FileStore,
    ttl: Duration,
    interval: Duration,
    enabled: bool,
}

impl RetentionSweeper {
    /// Create a sweeper for `store` using the retention settings in `config`.
    pub fn new(store: FileStore, config: &StorageConfig) -> Self {
        Self {
            store,
            ttl: config.ttl,
            interval: config.sweep_interval,
            enabled: config.sweep_enabled,
        }
    }

    /// Start the background sweep loop.
    ///
    /// Runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Artifact retention sweep is disabled");
            return;
        }

        info!(
            "Starting artifact retention sweep (interval: {:?}, ttl: {:?})",
            self.interval, self.ttl
        );

        let mut ticker = interval(self.interval);

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(_) => metrics::record_retention_sweep("success"),
                Err(e) => {
                    metrics::record_retention_sweep("error");
                    error!("Artifact retention sweep error: {}", e);
                }
            }
        }
    }

    /// Run a single sweep cycle.
    pub async fn sweep_once(&self) -> anyhow::Result<SweepReport> {
        let report = self.store.sweep_expired(self.ttl).await?;

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Retention sweep complete: {} scanned, {} removed, {} failed",
                report.scanned, report.removed, report.failed
            );
        } else {
            debug!(scanned = report.scanned, "Retention sweep found nothing to evict");
        }

        Ok(report)
    }
}
