//! HTTP request handlers.

use super::types::{HealthResponse, ToolChatBody};
use super::AppState;
use crate::error::RelayError;
use crate::invoker::{parse_custom_headers, RequestMode};
use crate::pipeline::{ToolChat, ToolChatRequest};
use crate::profile::check_api_key;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use chat_client::ChatClient;
use futures::TryStreamExt;
use secrecy::ExposeSecret;
use tracing::{error, info};

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run a tool-calling chat exchange and stream the final answer as plain text.
pub async fn chat_tools(
    State(state): State<AppState>,
    payload: Result<Json<ToolChatBody>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(body) = payload?;

    let profile = state.profiles.profile().await?;
    let api_key = check_api_key(profile.api_key.as_ref(), "OpenAI")?;

    info!(
        model = %body.chat_settings.model,
        messages = body.messages.len(),
        schemas = body.tool_schemas.len(),
        in_body = body.is_request_in_body,
        "Tool chat request received"
    );

    let chat = ChatClient::with_http_client(
        state.http.clone(),
        api_key.expose_secret().as_str(),
        profile.organization_id.clone(),
        state.model_base_url.as_str(),
        state.model_timeout,
    );
    let request = ToolChatRequest {
        params: body.chat_settings.params(),
        model: body.chat_settings.model,
        messages: body.messages,
        tool_schemas: body.tool_schemas,
        custom_headers: parse_custom_headers(&body.custom_headers)?,
        mode: RequestMode::from_request_in_body(body.is_request_in_body),
    };

    let pipeline = ToolChat::new(chat, state.invoker.clone(), state.converter.clone());
    let tokens = pipeline.run(request).await?;

    // Once streaming has started the status is sent; a failure can only cut the body short.
    let tokens = tokens.inspect_err(|e| error!(error = %e, "Answer stream failed"));

    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(tokens),
    )
        .into_response())
}
