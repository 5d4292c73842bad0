//! API request and response types.

use chat_client::{ChatParams, Message};
use serde::{Deserialize, Serialize};

/// Model selection and sampling parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatSettings {
    pub fn params(&self) -> ChatParams {
        ChatParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Body of a tool chat request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolChatBody {
    pub chat_settings: ChatSettings,
    pub messages: Vec<Message>,
    /// Raw OpenAPI documents, one per tool source.
    #[serde(default)]
    pub tool_schemas: Vec<String>,
    /// JSON-encoded object of extra headers, or empty.
    #[serde(default)]
    pub custom_headers: String,
    /// POST arguments as a JSON body instead of a GET query string.
    #[serde(default)]
    pub is_request_in_body: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
