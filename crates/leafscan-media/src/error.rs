//! Media error types.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while annotating images.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid font: {0}")]
    Font(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
