//! LINE Messaging API client
//!
//! Only the reply endpoint is used: one call per text message, addressed by
//! the event's reply token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::errors::RelayError;

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 5000;

const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends a text reply for a given reply token.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), RelayError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessageRequest {
    pub reply_token: String,
    pub messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
pub struct TextMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ReplyMessageRequest {
    #[must_use]
    pub fn text(reply_token: &str, text: &str) -> Self {
        Self {
            reply_token: reply_token.to_string(),
            messages: vec![TextMessage {
                kind: "text",
                text: truncate_chars(text, MAX_TEXT_CHARS),
            }],
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Reply client authenticated with the channel access token.
pub struct LineClient {
    http: Client,
    api_base: String,
    channel_access_token: String,
}

impl LineClient {
    #[must_use]
    pub fn new(api_base: &str, channel_access_token: String) -> Self {
        let http = Client::builder()
            .timeout(REPLY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            channel_access_token,
        }
    }

    fn reply_url(&self) -> String {
        format!("{}/v2/bot/message/reply", self.api_base)
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), RelayError> {
        let payload = ReplyMessageRequest::text(reply_token, text);

        let response = self
            .http
            .post(self.reply_url())
            .bearer_auth(&self.channel_access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::ReplySendFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::ReplySendFailed(format!(
                "LINE API returned {status}: {error_text}"
            )));
        }

        info!("Reply sent");
        Ok(())
    }
}
