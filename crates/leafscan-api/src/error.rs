//! API error types.
//!
//! Every error leaves the server as `{"error": ..., "code": ...}` with a
//! status code specific to its kind. Internal errors carry an
//! [`InternalErrorMarker`] extension so the router can redact their message
//! in production.

use axum::extract::multipart::MultipartError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use leafscan_media::MediaError;
use leafscan_ml_client::MlError;
use leafscan_models::UnknownPlant;
use leafscan_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPlant(#[from] UnknownPlant),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Inference failed: {0}")]
    Inference(#[from] MlError),

    #[error("Image error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPlant(_) => "invalid_plant",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::RateLimited => "rate_limited",
            ApiError::Inference(_) => "inference_failed",
            ApiError::Media(_) | ApiError::Storage(_) | ApiError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPlant(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Inference(_) => StatusCode::BAD_GATEWAY,
            ApiError::Media(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Storage(err)
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

/// Response extension set on every internal error.
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorMarker;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_choices: Option<Vec<String>>,
}

/// Generic replacement for an internal error response.
pub fn redacted_internal_error() -> Response {
    let body = ErrorResponse {
        error: "An internal error occurred".to_string(),
        code: "internal",
        valid_choices: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let internal = self.is_internal();

        if internal {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        }

        let valid_choices = match &self {
            ApiError::InvalidPlant(e) => Some(e.valid_choices.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
            valid_choices,
        };

        let mut response = match self {
            ApiError::RateLimited => (status, [(header::RETRY_AFTER, "1")], Json(body)).into_response(),
            _ => (status, Json(body)).into_response(),
        };
        if internal {
            response.extensions_mut().insert(InternalErrorMarker);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_per_kind() {
        let unknown = UnknownPlant {
            plant: "wheat".to_string(),
            valid_choices: vec!["rice".to_string()],
        };
        assert_eq!(ApiError::from(unknown).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(MlError::InvalidResponse("x".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_storage_not_found_maps_to_404() {
        let err = ApiError::from(StorageError::not_found("annotated_x.jpg"));
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = ApiError::from(StorageError::Io(std::io::Error::other("disk full")));
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn test_inference_error_keeps_remote_text() {
        let err = ApiError::from(MlError::RemoteStatus {
            status: 401,
            body: "invalid api key".to_string(),
        });
        assert!(err.to_string().contains("invalid api key"));
        assert_eq!(err.code(), "inference_failed");
    }

    #[test]
    fn test_internal_errors_are_marked_for_redaction() {
        let response = ApiError::internal("disk on fire").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalErrorMarker>().is_some());

        let response = ApiError::not_found("x").into_response();
        assert!(response.extensions().get::<InternalErrorMarker>().is_none());
    }

    #[test]
    fn test_payload_too_large_status() {
        let err = ApiError::PayloadTooLarge("length limit exceeded".into());
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code(), "payload_too_large");
    }
}
