//! OpenAI-compatible chat completion HTTP client.

use crate::error::ChatError;
use crate::stream::decode_sse;
use crate::types::*;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, instrument, warn};

/// Chat completion client.
///
/// The API key is stored using `SecretString` to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    organization: Option<String>,
    timeout: Duration,
}

/// Provider error body: `{"error": {"message": "..."}}`.
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// `timeout` bounds each non-streaming call, and the time until a
    /// streaming response starts.
    pub fn new(
        api_key: impl Into<String>,
        organization: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self::with_http_client(client, api_key, organization, base_url, timeout))
    }

    /// Create a client on top of an existing connection pool.
    pub fn with_http_client(
        client: Client,
        api_key: impl Into<String>,
        organization: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: SecretString::new(api_key.into()),
            organization,
            timeout,
        }
    }

    fn completions(&self) -> RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json");
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }

    /// Send a non-streaming completion request, offering `tools` to the model.
    ///
    /// Returns the full assistant message, including any requested tool calls.
    #[instrument(skip(self, messages, params, tools), fields(message_count = messages.len(), tool_count = tools.map_or(0, |t| t.len())))]
    pub async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        params: &ChatParams,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatResponseWithTools, ChatError> {
        let request = ChatRequest {
            model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: Some(false),
            tools: tools.filter(|t| !t.is_empty()),
        };

        let response = self
            .completions()
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let chat_response = self.handle_response::<ChatResponse>(response).await?;
        let usage = chat_response.usage;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?;

        debug!(
            finish_reason = ?choice.finish_reason,
            tool_calls = choice.message.tool_calls.as_ref().map_or(0, Vec::len),
            "Received completion"
        );

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
            usage,
        })
    }

    /// Send a streaming completion request and yield content tokens as they arrive.
    ///
    /// The timeout bounds the wait for the response and every later gap
    /// between body chunks; an idle upstream ends the stream with
    /// [`ChatError::Timeout`]. The returned stream owns the upstream
    /// connection; dropping it closes the connection.
    #[instrument(skip(self, messages, params), fields(message_count = messages.len()))]
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        params: &ChatParams,
    ) -> Result<impl Stream<Item = Result<String, ChatError>> + Send + 'static, ChatError> {
        let request = ChatRequest {
            model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: Some(true),
            tools: None,
        };

        let response = tokio::time::timeout(self.timeout, self.completions().json(&request).send())
            .await
            .map_err(|_| ChatError::Timeout(self.timeout))??;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        let idle = self.timeout;
        let bytes = response
            .bytes_stream()
            .timeout(idle)
            .map(move |chunk| match chunk {
                Ok(chunk) => chunk.map_err(ChatError::from),
                Err(_) => Err(ChatError::Timeout(idle)),
            });

        Ok(decode_sse(bytes))
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ChatError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            debug!("Response body: {}", truncate(&body, 200));
            serde_json::from_str(&body).map_err(ChatError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error information from failed response.
    async fn extract_error(&self, response: reqwest::Response) -> ChatError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        let provider_message = serde_json::from_str::<ErrorBody>(&message)
            .ok()
            .and_then(|body| body.error.message);

        warn!(
            status = status.as_u16(),
            provider_message = provider_message.as_deref().unwrap_or(""),
            "Completion request rejected"
        );

        ChatError::Api {
            status: status.as_u16(),
            message,
            provider_message,
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
