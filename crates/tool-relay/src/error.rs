//! Error types for the relay, and the wire envelope they are reported in.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat_client::ChatError;
use openapi_tools::SchemaError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message reported when a failure carries none from the model provider.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Coarse classification of a [`RelayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credentials; no model call was attempted.
    Config,
    /// Malformed input: request body, OpenAPI document, headers or tool arguments.
    Parse,
    /// A requested function is not exposed by any document.
    Resolution,
    /// The model provider or a tool endpoint failed.
    Transport,
    Internal,
}

/// Relay error types.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(#[from] JsonRejection),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Model provider error: {0}")]
    Model(#[from] ChatError),

    #[error("Tool {function} failed: {message}")]
    ToolTransport { function: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Config(_) => ErrorKind::Config,
            RelayError::InvalidRequest(_) | RelayError::Parse(_) => ErrorKind::Parse,
            RelayError::Resolution(_) => ErrorKind::Resolution,
            RelayError::Model(_) | RelayError::ToolTransport { .. } => ErrorKind::Transport,
            RelayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Status code explicitly carried by the failure, if any.
    fn carried_status(&self) -> Option<StatusCode> {
        match self {
            RelayError::Model(e) => e
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error()),
            RelayError::InvalidRequest(rejection) => Some(rejection.status()),
            _ => None,
        }
    }

    /// Message supplied by the model provider, if any.
    fn provider_message(&self) -> Option<&str> {
        match self {
            RelayError::Model(e) => e.provider_message(),
            _ => None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self
            .carried_status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self
            .provider_message()
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string();

        error!(kind = ?self.kind(), status = status.as_u16(), error = %self, "Request failed");

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<SchemaError> for RelayError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::FunctionNotFound(_) => RelayError::Resolution(e.to_string()),
            SchemaError::Parse(_) | SchemaError::Invalid(_) => RelayError::Parse(e.to_string()),
        }
    }
}
