//! Write-once artifact store on local disk.

use std::path::{Path, PathBuf};

use leafscan_models::{ArtifactKind, ArtifactName};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Directory-backed store for request artifacts.
///
/// Every file is created with `create_new`, so a name can never be written
/// twice; uniqueness of generated names is the only coordination between
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

/// A file read back for the download endpoint.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: ArtifactName,
    pub bytes: Vec<u8>,
}

impl FileStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact.
    pub fn path_of(&self, name: &ArtifactName) -> PathBuf {
        self.root.join(name.to_string())
    }

    /// Persist an uploaded image under a fresh `temp_*` name.
    ///
    /// The returned guard deletes the file when dropped.
    pub async fn save_upload(&self, bytes: &[u8], extension: &str) -> StorageResult<TempUpload> {
        let name = ArtifactName::generate(ArtifactKind::Upload, extension);
        let path = self.write_new(&name, bytes).await?;
        Ok(TempUpload {
            name,
            path,
            removed: false,
        })
    }

    /// Persist an annotated image under a fresh `annotated_*` name.
    pub async fn save_annotated(&self, bytes: &[u8], extension: &str) -> StorageResult<ArtifactName> {
        let name = ArtifactName::generate(ArtifactKind::Annotated, extension);
        self.write_new(&name, bytes).await?;
        Ok(name)
    }

    /// Read an annotated image by file name.
    ///
    /// Names that are not annotated artifacts, and files that do not exist,
    /// both come back as "not found".
    pub async fn read_annotated(&self, file_name: &str) -> StorageResult<StoredFile> {
        let name: ArtifactName = file_name.parse()?;
        if name.kind() != ArtifactKind::Annotated {
            return Err(StorageError::not_found(file_name));
        }

        let path = self.path_of(&name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(StoredFile { name, bytes }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(file_name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the directory exists and accepts writes.
    pub async fn check_writable(&self) -> bool {
        let marker = self.root.join(format!(".write-check-{}", std::process::id()));
        let ok = fs::write(&marker, b"ok").await.is_ok();
        let _ = fs::remove_file(&marker).await;
        ok
    }

    async fn write_new(&self, name: &ArtifactName, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.path_of(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(file = %name, bytes = bytes.len(), "Stored {} artifact", name.kind());
        Ok(path)
    }
}

/// Uploaded image on disk.
///
/// Call [`TempUpload::remove`] once the file is no longer needed. A guard
/// dropped without it, on an early return or a panic, unlinks the file
/// synchronously instead.
#[derive(Debug)]
pub struct TempUpload {
    name: ArtifactName,
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    pub fn name(&self) -> &ArtifactName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file without blocking the runtime.
    pub async fn remove(mut self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(file = %self.name, "Removed temporary upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(file = %self.name, "Failed to remove temporary upload: {}", e);
                return;
            }
        }
        self.removed = true;
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(file = %self.name, "Removed temporary upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %self.name, "Failed to remove temporary upload: {}", e),
        }
    }
}
