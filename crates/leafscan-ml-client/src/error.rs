//! Inference client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("Inference service returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Invalid response from inference service: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

impl MlError {
    /// Status code returned by the remote service, if it answered at all.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            MlError::RemoteStatus { status, .. } => Some(*status),
            MlError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MlError::RemoteStatus { .. } => "remote_status",
            MlError::InvalidResponse(_) => "invalid_response",
            MlError::Network(_) => "network",
            MlError::Io(_) => "io",
        }
    }
}
