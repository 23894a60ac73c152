//! Shared data models for the LeafScan service.
//!
//! This crate provides Serde-serializable types for:
//! - The plant type to remote model registry
//! - Prediction records and inference results
//! - Bounding box geometry for detections
//! - Names of files produced on local disk

pub mod artifact;
pub mod plant;
pub mod prediction;
pub mod rect;

// Re-export common types
pub use artifact::{ArtifactKind, ArtifactName, ArtifactNameError};
pub use plant::{ModelId, ModelIdParseError, ModelRegistry, RegistryError, UnknownPlant};
pub use prediction::{format_confidence, InferenceResult, Prediction};
pub use rect::{BoundingBox, CenterBox};
