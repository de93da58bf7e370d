//! API Lambda handler.
//!
//! Adapts the API Gateway proxy event, loads secrets from Parameter Store,
//! and hands the request to the [`WebhookRelay`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;

use super::helpers;
use super::relay::WebhookRelay;
use crate::clients::{CompletionClient, LlmClient};
use crate::core::config::AppConfig;
use crate::core::models::{ChannelSecrets, InboundRequest};
use crate::core::secrets::{self, ParameterStore, SecretProvider};
use crate::errors::RelayError;
use crate::line::{LineClient, ReplySender};

pub use self::function_handler as handler;

/// Lambda handler for the webhook endpoint.
///
/// # Errors
///
/// Returns an error only if the configuration is invalid; every relay
/// failure is rendered as an error response instead.
#[tracing::instrument(level = "info", skip(event), fields(correlation_id = %Uuid::new_v4()))]
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        Error::from(e)
    })?;

    let store = secrets::ssm_client(&config).await;
    Ok(handle_invocation(&config, store, &event.payload).await)
}

/// Runs one invocation against the given parameter store.
pub async fn handle_invocation<S: ParameterStore>(
    config: &AppConfig,
    store: S,
    payload: &Value,
) -> Value {
    let request = match inbound_request(payload) {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            return helpers::relay_error_response(&e);
        }
    };
    info!(method = %request.method, path = %request.path, "Webhook received");

    let provider = SecretProvider::new(store, config.ssm_timeout);
    let secrets = match provider.load(config).await {
        Ok(s) => s,
        Err(e) => return helpers::relay_error_response(&e),
    };

    let completion = LlmClient::new(config.openai_endpoint.clone(), config.openai_model.clone());
    let replier = LineClient::new(&config.line_api_base, secrets.channel_access_token.clone());

    relay_response(&secrets, &completion, &replier, &request).await
}

async fn relay_response(
    secrets: &ChannelSecrets,
    completion: &dyn CompletionClient,
    replier: &dyn ReplySender,
    request: &InboundRequest,
) -> Value {
    let relay = WebhookRelay::new(
        &secrets.channel_secret,
        &secrets.openai_api_key,
        completion,
        replier,
    );

    match relay.handle(request).await {
        Ok(outcome) => {
            info!(
                events = outcome.events,
                text_messages = outcome.text_messages,
                replies_sent = outcome.replies_sent,
                replies_failed = outcome.replies_failed,
                "Webhook handled"
            );
            helpers::ok_empty()
        }
        Err(e) => {
            error!("Webhook failed: {}", e);
            helpers::relay_error_response(&e)
        }
    }
}

/// Builds an [`InboundRequest`] from an API Gateway proxy event (REST or
/// HTTP API payload format).
///
/// # Errors
///
/// Returns [`RelayError::ParseFailed`] if a base64-encoded body does not
/// decode to UTF-8 text.
pub fn inbound_request(payload: &Value) -> Result<InboundRequest, RelayError> {
    let method = payload
        .get("httpMethod")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("requestContext")
                .and_then(|c| c.get("http"))
                .and_then(|h| h.get("method"))
                .and_then(Value::as_str)
        })
        .unwrap_or("POST")
        .to_string();

    let path = payload
        .get("rawPath")
        .and_then(Value::as_str)
        .or_else(|| payload.get("path").and_then(Value::as_str))
        .unwrap_or("/")
        .to_string();

    let headers: HashMap<String, String> = payload
        .get("headers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let raw_body = payload.get("body").and_then(Value::as_str).unwrap_or("");
    let is_base64 = payload
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let body = if is_base64 {
        let bytes = STANDARD
            .decode(raw_body)
            .map_err(|e| RelayError::ParseFailed(format!("Invalid base64 body: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| RelayError::ParseFailed(format!("Body is not UTF-8: {e}")))?
    } else {
        raw_body.to_string()
    };

    Ok(InboundRequest {
        method,
        path,
        headers,
        body,
    })
}
