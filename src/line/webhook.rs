//! LINE webhook payload parsing.
//!
//! Only the subset of the payload the relay acts on is modelled. Event and
//! message types we do not handle collapse into [`MessageEvent::Other`].

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::models::MessageEvent;
use crate::errors::RelayError;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WebhookEvent {
    Message {
        #[serde(rename = "replyToken", default)]
        reply_token: Option<String>,
        message: EventMessage,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum EventMessage {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

impl WebhookEvent {
    fn into_message_event(self) -> MessageEvent {
        match self {
            WebhookEvent::Message {
                reply_token: Some(reply_token),
                message: EventMessage::Text { text },
            } if !reply_token.is_empty() => MessageEvent::TextMessage { text, reply_token },
            WebhookEvent::Message {
                message: EventMessage::Text { .. },
                ..
            } => {
                debug!("Text message without reply token, ignoring");
                MessageEvent::Other
            }
            WebhookEvent::Message {
                message: EventMessage::Unsupported,
                ..
            }
            | WebhookEvent::Unsupported => MessageEvent::Other,
        }
    }
}

/// Parses a webhook body into events, preserving payload order.
///
/// Accepts the standard `{"destination": ..., "events": [...]}` envelope as
/// well as a bare array of events. The whole body is rejected if any event
/// is malformed.
///
/// # Errors
///
/// Returns [`RelayError::ParseFailed`] if the body is not valid JSON, has an
/// unexpected shape, or contains a malformed event.
pub fn parse_events(body: &str) -> Result<Vec<MessageEvent>, RelayError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| RelayError::ParseFailed(format!("Invalid JSON body: {e}")))?;

    let raw_events = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(RelayError::ParseFailed(
                    "`events` is not an array".to_string(),
                ));
            }
        },
        _ => {
            return Err(RelayError::ParseFailed(
                "Body is neither an object nor an array".to_string(),
            ));
        }
    };

    raw_events
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            serde_json::from_value::<WebhookEvent>(raw)
                .map(WebhookEvent::into_message_event)
                .map_err(|e| RelayError::ParseFailed(format!("Invalid event at index {idx}: {e}")))
        })
        .collect()
}
