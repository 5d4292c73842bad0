//! Configuration for the relay.

use crate::invoker::ToolFailurePolicy;
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model provider configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Outbound tool call configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// API key served by the configured profile
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Organization sent as `OpenAI-Organization`
    #[serde(default)]
    pub organization_id: Option<String>,

    /// Chat completions base URL
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Bound on each model round trip
    #[serde(default = "default_openai_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Bound on each tool endpoint call
    #[serde(default = "default_tool_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// What a failing tool endpoint does to the exchange
    #[serde(default)]
    pub failure_policy: ToolFailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            organization_id: None,
            base_url: default_openai_base_url(),
            timeout: default_openai_timeout(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: default_tool_timeout(),
            failure_policy: ToolFailurePolicy::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_openai_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables, e.g. `OPENAI__API_KEY`.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
