//! Seam between request handling and the remote service.

use std::path::Path;

use async_trait::async_trait;
use leafscan_models::{InferenceResult, ModelId};

use crate::error::MlResult;

/// Anything that can run one inference call for an image on disk.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run `model` against the image stored at `image_path`.
    async fn infer(&self, image_path: &Path, model: &ModelId) -> MlResult<InferenceResult>;

    /// Whether the backend is reachable. Never fails hard.
    async fn health_check(&self) -> bool {
        true
    }
}
