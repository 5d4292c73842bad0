//! HTTP API for the relay.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::config::Config;
use crate::error::RelayError;
use crate::invoker::ToolInvoker;
use crate::profile::{ConfigProfileSource, ProfileSource};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use openapi_tools::{OpenApiConverter, SchemaConverter};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Shared application state. Nothing here changes between requests.
#[derive(Clone)]
pub struct AppState {
    /// Caller credential lookup
    pub profiles: Arc<dyn ProfileSource>,
    /// Connection pool for model calls
    pub http: Client,
    /// Chat completions base URL
    pub model_base_url: String,
    /// Bound on each model round trip
    pub model_timeout: Duration,
    /// Tool call executor
    pub invoker: ToolInvoker,
    /// OpenAPI document converter
    pub converter: Arc<dyn SchemaConverter>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        model_base_url: impl Into<String>,
        model_timeout: Duration,
        invoker: ToolInvoker,
    ) -> Result<Self, RelayError> {
        let http = Client::builder()
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            profiles,
            http,
            model_base_url: model_base_url.into(),
            model_timeout,
            invoker,
            converter: Arc::new(OpenApiConverter),
        })
    }

    /// Build state from configuration, serving the configured profile.
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let profiles = Arc::new(ConfigProfileSource::new(
            config.openai.api_key.clone(),
            config.openai.organization_id.clone(),
        ));
        let tool_client = Client::builder()
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {}", e)))?;
        let invoker = ToolInvoker::new(tool_client, config.tools.timeout)
            .with_policy(config.tools.failure_policy);

        Self::new(
            profiles,
            config.openai.base_url.clone(),
            config.openai.timeout,
            invoker,
        )
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/chat/tools", post(handlers::chat_tools))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
