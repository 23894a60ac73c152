//! Local file store for uploads and annotated images.
//!
//! This crate provides:
//! - Write-once storage of request artifacts under random names
//! - Validated, existence-checked lookups for the download endpoint
//! - Time-to-live retention sweeps

pub mod config;
pub mod error;
pub mod retention;
pub mod store;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use retention::SweepReport;
pub use store::{FileStore, StoredFile, TempUpload};
