//! Caller profile lookup: which provider credentials a request runs with.

use crate::error::RelayError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// Provider credentials for the current caller.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub api_key: Option<SecretString>,
    pub organization_id: Option<String>,
}

/// Source of the caller's profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile(&self) -> Result<Profile, RelayError>;
}

/// Serves one fixed profile taken from configuration.
pub struct ConfigProfileSource {
    profile: Profile,
}

impl ConfigProfileSource {
    pub fn new(api_key: Option<SecretString>, organization_id: Option<String>) -> Self {
        Self {
            profile: Profile {
                api_key,
                organization_id,
            },
        }
    }
}

#[async_trait]
impl ProfileSource for ConfigProfileSource {
    async fn profile(&self) -> Result<Profile, RelayError> {
        Ok(self.profile.clone())
    }
}

/// Fail fast when the provider key is absent or blank.
pub fn check_api_key<'a>(
    api_key: Option<&'a SecretString>,
    provider: &str,
) -> Result<&'a SecretString, RelayError> {
    api_key
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or_else(|| RelayError::Config(format!("{} API Key not found", provider)))
}
