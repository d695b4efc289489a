//! Error types for ordr-rv

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::validation_session::FailureReason;
use crate::services::order_source::FetchError;

/// Session-level validation failures
///
/// Each one aborts the run without producing a report; whatever report was
/// stored before stays untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Remote order fetch timed out: {0}")]
    RemoteFetchTimeout(String),

    #[error("Remote order fetch failed: {0}")]
    RemoteFetchTransportError(String),

    #[error("Validation session cancelled")]
    SessionCancelled,

    #[error("No data to validate: {0}")]
    NoData(String),

    #[error("Invalid campaign: {0}")]
    InvalidCampaign(String),
}

impl ValidationError {
    /// Serializable reason code; `None` when no session was started
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            ValidationError::RemoteFetchTimeout(_) => Some(FailureReason::Timeout),
            ValidationError::RemoteFetchTransportError(_) => Some(FailureReason::TransportError),
            ValidationError::SessionCancelled => Some(FailureReason::Cancelled),
            ValidationError::NoData(_) => Some(FailureReason::NoData),
            ValidationError::InvalidCampaign(_) => None,
        }
    }
}

impl From<FetchError> for ValidationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(msg) => ValidationError::RemoteFetchTimeout(msg),
            FetchError::Transport(msg) => ValidationError::RemoteFetchTransportError(msg),
            FetchError::Cancelled => ValidationError::SessionCancelled,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Validation run failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// ordr-common error
    #[error("Common error: {0}")]
    Common(#[from] ordr_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Validation(ref err) => {
                let (status, code) = match err {
                    ValidationError::RemoteFetchTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "REMOTE_TIMEOUT"),
                    ValidationError::RemoteFetchTransportError(_) => (StatusCode::BAD_GATEWAY, "REMOTE_TRANSPORT"),
                    ValidationError::SessionCancelled => (StatusCode::CONFLICT, "CANCELLED"),
                    ValidationError::NoData(_) => (StatusCode::UNPROCESSABLE_ENTITY, "NO_DATA"),
                    ValidationError::InvalidCampaign(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                };
                (status, code, err.to_string())
            }
            ApiError::Common(ref err) => match err {
                ordr_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                ordr_common::Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                other => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", other.to_string()),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
