//! Error types for the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use openclaw_core::SandboxError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Body could not be decoded as the expected JSON
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Body exceeded the configured limit
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    /// Missing code or unsupported language
    #[error("{0}")]
    InvalidInput(String),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<SandboxError> for ServerError {
    fn from(err: SandboxError) -> Self {
        if err.is_client_error() {
            ServerError::InvalidInput(err.to_string())
        } else {
            ServerError::Internal(err.to_string())
        }
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) | ServerError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Config(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::PayloadTooLarge(_) => "payload_too_large",
            ServerError::InvalidInput(_) => "invalid_input",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{} ({})", self, self.error_type());
        } else {
            log::warn!("Rejected request: {} ({})", self, self.error_type());
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
