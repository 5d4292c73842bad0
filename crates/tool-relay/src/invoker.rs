//! Executes model-requested tool calls against the registered HTTP endpoints.

use crate::error::RelayError;
use chat_client::{Message, ToolCall};
use futures::{stream, StreamExt, TryStreamExt};
use openapi_tools::{FunctionEntry, FunctionRegistry, HeaderPairs};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// How tool arguments are encoded into the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// POST with the arguments as a JSON body; custom headers applied.
    Body,
    /// GET with the arguments as a query string; no body, no custom headers.
    Query,
}

impl RequestMode {
    pub fn from_request_in_body(in_body: bool) -> Self {
        if in_body {
            RequestMode::Body
        } else {
            RequestMode::Query
        }
    }
}

/// What a failing tool endpoint does to the exchange.
///
/// Unknown functions and malformed arguments abort under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFailurePolicy {
    /// The whole request fails.
    #[default]
    Abort,
    /// The failure becomes the tool result, so the model can react to it.
    Report,
}

/// Runs tool calls sequentially, in the order the model requested them.
#[derive(Clone)]
pub struct ToolInvoker {
    client: Client,
    timeout: Duration,
    policy: ToolFailurePolicy,
}

impl ToolInvoker {
    /// Create a new invoker.
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            policy: ToolFailurePolicy::Abort,
        }
    }

    /// Set the endpoint failure policy.
    pub fn with_policy(mut self, policy: ToolFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute every call and return one tool message per call, in order.
    ///
    /// Each call completes before the next starts. The first fatal error
    /// stops the fold; results gathered so far are discarded.
    pub async fn invoke_all(
        &self,
        registry: &FunctionRegistry,
        calls: &[ToolCall],
        mode: RequestMode,
    ) -> Result<Vec<Message>, RelayError> {
        stream::iter(calls)
            .then(|call| self.invoke(registry, call, mode))
            .try_collect()
            .await
    }

    /// Execute a single tool call.
    #[instrument(skip(self, registry, call), fields(tool = %call.function.name, call_id = %call.id))]
    pub async fn invoke(
        &self,
        registry: &FunctionRegistry,
        call: &ToolCall,
        mode: RequestMode,
    ) -> Result<Message, RelayError> {
        let name = &call.function.name;
        let entry = registry.resolve(name)?;
        let arguments = parse_arguments(name, &call.function.arguments)?;

        let content = match self.send(entry, &arguments, mode).await {
            Ok(body) => {
                info!(url = %entry.url(), "Tool executed successfully");
                body.to_string()
            }
            Err(e @ RelayError::ToolTransport { .. }) if self.policy == ToolFailurePolicy::Report => {
                warn!(error = %e, "Tool failed, reporting to model");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
            Err(e) => return Err(e),
        };

        Ok(Message::tool_result(&call.id, name, content))
    }

    async fn send(
        &self,
        entry: &FunctionEntry,
        arguments: &Map<String, Value>,
        mode: RequestMode,
    ) -> Result<Value, RelayError> {
        let url = entry.url();
        let request = match mode {
            RequestMode::Body => {
                let body = serde_json::to_vec(arguments)
                    .map_err(|e| RelayError::Internal(e.to_string()))?;
                self.client
                    .post(&url)
                    .headers(body_headers(&entry.headers)?)
                    .body(body)
            }
            RequestMode::Query => self.client.get(&url).query(&query_pairs(arguments)),
        };

        let failed = |message: String| RelayError::ToolTransport {
            function: entry.name.clone(),
            message,
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("endpoint returned {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| failed(format!("invalid JSON response: {}", e)))
    }
}

/// Parse a tool call's argument text. Empty text means no arguments.
fn parse_arguments(function: &str, raw: &str) -> Result<Map<String, Value>, RelayError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RelayError::Parse(format!(
            "arguments for {} are not a JSON object",
            function
        ))),
        Err(e) => Err(RelayError::Parse(format!(
            "arguments for {} are not valid JSON: {}",
            function, e
        ))),
    }
}

/// `Content-Type: application/json`, overridden by any custom header of the same name.
fn body_headers(custom: &HeaderPairs) -> Result<HeaderMap, RelayError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in custom {
        let (name, value) = header_pair(name, value)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), RelayError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| RelayError::Parse(format!("invalid header name {:?}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| RelayError::Parse(format!("invalid value for header {}: {}", name, e)))?;
    Ok((name, value))
}

/// Parse the caller's JSON-encoded custom headers. Empty text means none.
///
/// Non-string values are sent as their JSON text.
pub fn parse_custom_headers(raw: &str) -> Result<HeaderPairs, RelayError> {
    if raw.trim().is_empty() {
        return Ok(HeaderPairs::new());
    }
    let parsed: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| RelayError::Parse(format!("custom headers are not a JSON object: {}", e)))?;

    let mut headers = HeaderPairs::new();
    for (name, value) in parsed {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        header_pair(&name, &value)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Flatten arguments into `key=value` pairs.
///
/// Strings are used as-is, arrays join their items with `,`, and every other
/// value is written as its JSON text.
pub fn query_pairs(arguments: &Map<String, Value>) -> Vec<(String, String)> {
    arguments
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
                other => scalar_text(other),
            };
            (key.clone(), value)
        })
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
