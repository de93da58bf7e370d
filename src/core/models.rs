use std::collections::HashMap;

/// HTTP-shaped view of one webhook invocation.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl InboundRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(v) = self.headers.get(name) {
            return Some(v.as_str());
        }
        self.headers.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                Some(v.as_str())
            } else {
                None
            }
        })
    }
}

/// A webhook event as far as the relay cares about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    /// A user sent a text message; `reply_token` is never empty.
    TextMessage { text: String, reply_token: String },
    /// Any other event or message type.
    Other,
}

/// The three secrets one invocation needs.
#[derive(Clone)]
pub struct ChannelSecrets {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub openai_api_key: String,
}

impl std::fmt::Debug for ChannelSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSecrets")
            .field("channel_secret", &"<redacted>")
            .field("channel_access_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

/// Summary of a successfully handled webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub status_code: u16,
    pub events: usize,
    pub text_messages: usize,
    pub replies_sent: usize,
    pub replies_failed: usize,
}
