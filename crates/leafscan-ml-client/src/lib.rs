//! Client for the hosted plant-disease inference service.
//!
//! Each call posts one base64-encoded image to `{api_url}/{model_id}` and
//! returns the normalized [`InferenceResult`](leafscan_models::InferenceResult).
//! Calls are never retried.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::InferenceBackend;
pub use client::{InferenceClient, InferenceConfig};
pub use error::{MlError, MlResult};
