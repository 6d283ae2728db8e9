//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Session id allocation gave up; message is passed through verbatim.
    #[error("{0}")]
    RetriesExhausted(String),

    /// Internal server error. The message is what the caller sees.
    #[error("{0}")]
    Internal(String),
}

impl From<tessel_session::Error> for ServerError {
    fn from(e: tessel_session::Error) -> Self {
        match e {
            tessel_session::Error::Internal => ServerError::Internal(e.to_string()),
            tessel_session::Error::RetriesExhausted { .. } => {
                ServerError::RetriesExhausted(e.to_string())
            }
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::RetriesExhausted(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "retries_exhausted")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();

        match &self {
            ServerError::Internal(_) | ServerError::RetriesExhausted(_) => {
                tracing::error!(status = %status, code, error = %message, "Server error");
            }
            ServerError::BadRequest(_) => {
                tracing::warn!(status = %status, code, error = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let internal: ServerError = tessel_session::Error::Internal.into();
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let exhausted: ServerError = tessel_session::Error::RetriesExhausted { attempts: 2 }.into();
        assert_eq!(
            exhausted.to_string(),
            "generate reached maximum number of retries"
        );
        assert_eq!(
            exhausted.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
