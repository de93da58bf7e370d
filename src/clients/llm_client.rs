//! LLM (`OpenAI`) chat-completion client
//!
//! Single-turn only: every request carries exactly one user message and no
//! history.

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::MessageRole;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::{DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL};
use crate::errors::CompletionError;

/// Round-trip bound for one completion request.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    #[must_use]
    pub fn single_user_message(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: MessageRole::user,
                content: prompt.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: Option<u32>,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::EmptyCompletion`] if there are no choices or
    /// the first choice has no content.
    pub fn into_reply_text(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyCompletion)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Turns a prompt into the assistant's reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, api_key: &str) -> Result<String, CompletionError>;
}

/// Chat-completions client for the `OpenAI` HTTP API.
pub struct LlmClient {
    http: Client,
    endpoint: String,
    model_name: String,
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new(DEFAULT_OPENAI_ENDPOINT.to_string(), DEFAULT_OPENAI_MODEL.to_string())
    }
}

impl LlmClient {
    #[must_use]
    pub fn new(endpoint: String, model_name: String) -> Self {
        Self {
            http: build_http_client(COMPLETION_TIMEOUT),
            endpoint,
            model_name,
        }
    }

    /// Replaces the round-trip timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_http_client(timeout);
        self
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, prompt: &str, api_key: &str) -> Result<String, CompletionError> {
        let request = ChatRequest::single_user_message(&self.model_name, prompt);

        #[cfg(feature = "debug-logs")]
        info!("Using ChatGPT request:\n{:?}", request);

        #[cfg(not(feature = "debug-logs"))]
        info!(
            model = %self.model_name,
            prompt_chars = prompt.chars().count(),
            "Requesting chat completion"
        );

        let body = serde_json::to_vec(&request)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(api_key)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<ChatResponse>(&bytes) {
            Ok(parsed) => {
                if !status.is_success() {
                    warn!(%status, "OpenAI returned a completion with a non-success status");
                }
                if let Some(usage) = &parsed.usage {
                    info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "Completion usage"
                    );
                }
                parsed.into_reply_text()
            }
            Err(e) if status.is_success() => Err(CompletionError::MarshalFailed(format!(
                "Failed to parse OpenAI response: {e}"
            ))),
            Err(_) => {
                let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                    .map(|b| b.error.message)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
                Err(CompletionError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REQUEST: &str =
        r#"{"model":"gpt-3.5-turbo","messages":[{"role":"user","content":"hello"}]}"#;

    #[test]
    fn test_chat_request_serializes_single_user_message() {
        let request = ChatRequest::single_user_message("gpt-3.5-turbo", "hello");
        assert_eq!(serde_json::to_string(&request).unwrap(), SAMPLE_REQUEST);
    }

    #[test]
    fn test_chat_request_round_trip_matches_sample() {
        let built = ChatRequest::single_user_message("gpt-3.5-turbo", "hello");
        let parsed: ChatRequest = serde_json::from_str(SAMPLE_REQUEST).unwrap();

        assert_eq!(parsed.model, built.model);
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(
            serde_json::to_string(&parsed.messages).unwrap(),
            serde_json::to_string(&built.messages).unwrap()
        );
    }

    #[test]
    fn test_reply_text_takes_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1", "object": "chat.completion", "created": 1700000000,
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"},
                    {"index": 1, "message": {"role": "assistant", "content": "second"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
            }"#,
        )
        .unwrap();

        assert_eq!(response.into_reply_text().unwrap(), "first");
    }

    #[test]
    fn test_empty_choices_is_error_not_panic() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            response.into_reply_text(),
            Err(CompletionError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_null_content_is_empty_completion() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            response.into_reply_text(),
            Err(CompletionError::EmptyCompletion)
        ));
    }

    #[test]
    fn test_default_client_uses_fixed_model() {
        let client = LlmClient::default();
        assert_eq!(client.model_name(), "gpt-3.5-turbo");
    }
}
