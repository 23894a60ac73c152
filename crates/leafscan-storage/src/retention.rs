//! Time-to-live eviction of managed artifacts.

use std::time::{Duration, SystemTime};

use leafscan_models::ArtifactName;
use metrics::counter;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::store::FileStore;

const ARTIFACTS_EVICTED_TOTAL: &str = "leafscan_artifacts_evicted_total";

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Managed files inspected
    pub scanned: usize,
    /// Files deleted
    pub removed: usize,
    /// Files that could not be deleted
    pub failed: usize,
}

impl FileStore {
    /// Delete managed artifacts older than `ttl`.
    ///
    /// Only files whose names parse as artifacts are considered; anything
    /// else in the directory is left alone.
    pub async fn sweep_expired(&self, ttl: Duration) -> StorageResult<SweepReport> {
        let now = SystemTime::now();
        let mut report = SweepReport::default();
        let mut entries = fs::read_dir(self.root()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|s| s.parse::<ArtifactName>().ok())
            else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %name, "Failed to stat artifact: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < ttl {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(file = %name, age_secs = age.as_secs(), "Evicted expired artifact");
                    counter!(ARTIFACTS_EVICTED_TOTAL, "kind" => name.kind().as_str()).increment(1);
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %name, "Failed to evict artifact: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn age_file(path: &std::path::Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let old = store.save_annotated(b"old", "jpg").await.unwrap();
        let fresh = store.save_annotated(b"fresh", "jpg").await.unwrap();
        age_file(&store.path_of(&old), Duration::from_secs(7200));

        let report = store.sweep_expired(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!store.path_of(&old).exists());
        assert!(store.path_of(&fresh).exists());
    }

    #[tokio::test]
    async fn test_sweep_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let foreign = dir.path().join("notes.txt");
        std::fs::write(&foreign, b"keep me").unwrap();
        age_file(&foreign, Duration::from_secs(7200));
        std::fs::create_dir(dir.path().join("annotated_0123456789abcdef0123456789abcdef.jpg")).unwrap();

        let report = store.sweep_expired(Duration::ZERO).await.unwrap();

        assert_eq!(report.removed, 0);
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_sweep_with_zero_ttl_clears_leftover_uploads() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let upload = store.save_upload(b"leaf", "png").await.unwrap();
        let path = upload.path().to_path_buf();
        std::mem::forget(upload);

        let report = store.sweep_expired(Duration::ZERO).await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(!path.exists());
    }
}
