//! Application state.

use std::sync::Arc;

use leafscan_media::Annotator;
use leafscan_ml_client::{InferenceBackend, InferenceClient};
use leafscan_models::ModelRegistry;
use leafscan_storage::FileStore;

use crate::config::{ApiConfig, AppConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub registry: Arc<ModelRegistry>,
    pub inference: Arc<dyn InferenceBackend>,
    pub annotator: Arc<Annotator>,
    pub store: FileStore,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(
        config: ApiConfig,
        registry: ModelRegistry,
        inference: Arc<dyn InferenceBackend>,
        annotator: Annotator,
        store: FileStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            inference,
            annotator: Arc::new(annotator),
            store,
        }
    }

    /// Create application state from the process configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = FileStore::open(config.storage.root.clone()).await?;
        let inference = InferenceClient::new(config.inference)?;
        let annotator = Annotator::from_env();

        Ok(Self::new(
            config.api,
            config.registry,
            Arc::new(inference),
            annotator,
            store,
        ))
    }
}
