//! Chat completion client errors.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        /// Raw response body.
        message: String,
        /// `error.message` from the provider's JSON error body, when present.
        provider_message: Option<String>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Empty response from AI service")]
    EmptyResponse,
}

impl ChatError {
    /// HTTP status reported by the provider, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Api { status, .. } => Some(*status),
            ChatError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message supplied by the provider in its error body.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ChatError::Api {
                provider_message, ..
            } => provider_message.as_deref(),
            _ => None,
        }
    }
}
