//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart prediction endpoints backed by a hosted inference service
//! - Download of annotated images
//! - Rate limiting, security headers and request IDs
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, AppConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::RetentionSweeper;
pub use state::AppState;
