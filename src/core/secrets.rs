//! Secret retrieval from AWS Systems Manager Parameter Store.
//!
//! Every invocation re-fetches its secrets; nothing is cached between calls.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use tracing::{debug, error};

use super::config::AppConfig;
use super::models::ChannelSecrets;
use crate::errors::RelayError;

/// Minimal key-value lookup the secret provider needs from a parameter store.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Returns `Ok(None)` when the parameter exists but carries no value.
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<Option<String>, String>;
}

#[async_trait]
impl ParameterStore for SsmClient {
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<Option<String>, String> {
        let resp = self
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|e| format!("ssm get_parameter: {}", DisplayErrorContext(&e)))?;

        Ok(resp
            .parameter()
            .and_then(|p| p.value())
            .map(ToString::to_string))
    }
}

/// Builds an SSM client for the configured region.
pub async fn ssm_client(config: &AppConfig) -> SsmClient {
    let shared = aws_config::from_env()
        .region(Region::new(config.region.clone()))
        .load()
        .await;
    SsmClient::new(&shared)
}

/// Fetches and decrypts a single parameter. One attempt, no retry.
///
/// # Errors
///
/// Returns [`RelayError::SecretFetchFailed`] if the store call fails or the
/// parameter has no value.
pub async fn fetch_parameter<S>(store: &S, name: &str) -> Result<String, RelayError>
where
    S: ParameterStore + ?Sized,
{
    match store.get_parameter(name, true).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(RelayError::SecretFetchFailed {
            name: name.to_string(),
            message: "parameter has no value".to_string(),
        }),
        Err(message) => Err(RelayError::SecretFetchFailed {
            name: name.to_string(),
            message,
        }),
    }
}

/// Secret provider over a parameter store, with a per-call time bound.
pub struct SecretProvider<S> {
    store: S,
    timeout: Duration,
}

impl<S: ParameterStore> SecretProvider<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// # Errors
    ///
    /// Returns [`RelayError::SecretFetchFailed`] if the lookup fails or does
    /// not finish within the configured timeout.
    pub async fn fetch(&self, name: &str) -> Result<String, RelayError> {
        debug!(parameter = %name, "Fetching parameter");
        match tokio::time::timeout(self.timeout, fetch_parameter(&self.store, name)).await {
            Ok(result) => result.inspect_err(|e| error!("{}", e)),
            Err(_) => {
                error!(parameter = %name, "Parameter fetch timed out");
                Err(RelayError::SecretFetchFailed {
                    name: name.to_string(),
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }

    /// Loads the channel secret, access token and API key, in that order,
    /// stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`RelayError::SecretFetchFailed`] encountered.
    pub async fn load(&self, config: &AppConfig) -> Result<ChannelSecrets, RelayError> {
        let channel_secret = self.fetch(&config.channel_secret_param).await?;
        let channel_access_token = self.fetch(&config.channel_access_token_param).await?;
        let openai_api_key = self.fetch(&config.openai_api_key_param).await?;

        Ok(ChannelSecrets {
            channel_secret,
            channel_access_token,
            openai_api_key,
        })
    }
}
