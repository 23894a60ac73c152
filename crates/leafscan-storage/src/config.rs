//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Where artifacts live and how long they are kept.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding uploads and annotated images
    pub root: PathBuf,
    /// Age after which managed files are deleted
    pub ttl: Duration,
    /// Interval between retention sweeps
    pub sweep_interval: Duration,
    /// Whether the background sweep runs at all
    pub sweep_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./artifacts"),
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            sweep_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: std::env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            ttl: std::env::var("ARTIFACT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            sweep_interval: std::env::var("RETENTION_SWEEP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweep_enabled: std::env::var("ENABLE_RETENTION_SWEEP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.sweep_enabled),
        }
    }
}
