//! Webhook relay: LINE text message in, chat completion out, LINE reply back.
//!
//! Events are handled strictly in payload order, one at a time. A failed
//! completion aborts the rest of the batch; a failed reply is logged and
//! does not change the outcome.

use tracing::{debug, error, info, warn};

use crate::clients::CompletionClient;
use crate::core::models::{InboundRequest, MessageEvent, RelayOutcome};
use crate::errors::RelayError;
use crate::line::{ReplySender, SIGNATURE_HEADER, parse_events, verify_line_signature};

pub struct WebhookRelay<'a> {
    channel_secret: &'a str,
    api_key: &'a str,
    completion: &'a dyn CompletionClient,
    replier: &'a dyn ReplySender,
}

impl<'a> WebhookRelay<'a> {
    #[must_use]
    pub fn new(
        channel_secret: &'a str,
        api_key: &'a str,
        completion: &'a dyn CompletionClient,
        replier: &'a dyn ReplySender,
    ) -> Self {
        Self {
            channel_secret,
            api_key,
            completion,
            replier,
        }
    }

    /// Verifies, parses and answers one webhook request.
    ///
    /// # Errors
    ///
    /// - [`RelayError::SignatureInvalid`] if the body signature does not check out
    /// - [`RelayError::ParseFailed`] if the payload cannot be parsed
    /// - [`RelayError::CompletionFailed`] on the first failed completion
    pub async fn handle(&self, request: &InboundRequest) -> Result<RelayOutcome, RelayError> {
        let signature = request.header(SIGNATURE_HEADER).unwrap_or_default();
        if !verify_line_signature(&request.body, signature, self.channel_secret) {
            return Err(RelayError::SignatureInvalid);
        }

        let events = parse_events(&request.body)?;
        info!(event_count = events.len(), "Parsed webhook events");

        let mut outcome = RelayOutcome {
            status_code: 200,
            events: events.len(),
            text_messages: 0,
            replies_sent: 0,
            replies_failed: 0,
        };

        for event in events {
            let (text, reply_token) = match event {
                MessageEvent::TextMessage { text, reply_token } => (text, reply_token),
                MessageEvent::Other => {
                    debug!("Skipping non-text event");
                    continue;
                }
            };
            outcome.text_messages += 1;
            debug!(text = %text, "Received text message");

            let reply_text = self
                .completion
                .complete(&text, self.api_key)
                .await
                .inspect_err(|e| error!("Completion failed, aborting batch: {}", e))?;
            debug!(reply = %reply_text, "Completion received");

            match self.replier.reply(&reply_token, &reply_text).await {
                Ok(()) => outcome.replies_sent += 1,
                Err(e) => {
                    warn!("{}", e);
                    outcome.replies_failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompletionError;
    use crate::line::compute_signature;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const SECRET: &str = "channel-secret";
    const API_KEY: &str = "sk-test";

    /// Completion fake: answers from a script, records prompts and keys.
    #[derive(Default)]
    struct ScriptedCompletion {
        script: Mutex<VecDeque<Result<String, CompletionError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        fn new(script: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, prompt: &str, api_key: &str) -> Result<String, CompletionError> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), api_key.to_string()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("echo: {prompt}")))
        }
    }

    #[derive(Default)]
    struct RecordingReplier {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplySender for RecordingReplier {
        async fn reply(&self, reply_token: &str, text: &str) -> Result<(), RelayError> {
            self.sent
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
            if self.fail {
                Err(RelayError::ReplySendFailed("LINE API returned 400".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn signed_request(body: &str) -> InboundRequest {
        let mut headers = HashMap::new();
        headers.insert(
            "X-Line-Signature".to_string(),
            compute_signature(body, SECRET),
        );
        InboundRequest {
            method: "POST".to_string(),
            path: "/callback".to_string(),
            headers,
            body: body.to_string(),
        }
    }

    fn text_event(token: &str, text: &str) -> String {
        format!(
            r#"{{"type":"message","replyToken":"{token}","message":{{"id":"1","type":"text","text":"{text}"}}}}"#
        )
    }

    fn payload(events: &[String]) -> String {
        format!(r#"{{"destination":"U0","events":[{}]}}"#, events.join(","))
    }

    #[tokio::test]
    async fn test_zero_events_returns_ok_without_completion() {
        let completion = ScriptedCompletion::default();
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let outcome = relay.handle(&signed_request(&payload(&[]))).await.unwrap();

        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.events, 0);
        assert_eq!(completion.call_count(), 0);
        assert!(replier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_has_no_side_effects() {
        let completion = ScriptedCompletion::default();
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let mut request = signed_request(&payload(&[text_event("r1", "hello")]));
        request.headers.insert(
            "X-Line-Signature".to_string(),
            compute_signature(&request.body, "wrong-secret"),
        );

        let err = relay.handle(&request).await.unwrap_err();

        assert!(matches!(err, RelayError::SignatureInvalid));
        assert_eq!(err.status_code(), 401);
        assert_eq!(completion.call_count(), 0);
        assert!(replier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let completion = ScriptedCompletion::default();
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let mut request = signed_request(&payload(&[text_event("r1", "hello")]));
        request.headers.clear();

        let err = relay.handle(&request).await.unwrap_err();
        assert!(matches!(err, RelayError::SignatureInvalid));
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_sends_nothing() {
        let completion = ScriptedCompletion::default();
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let body = format!(
            r#"{{"events":[{},{{"type":"message","replyToken":"r2"}}]}}"#,
            text_event("r1", "hello")
        );
        let err = relay.handle(&signed_request(&body)).await.unwrap_err();

        assert!(matches!(err, RelayError::ParseFailed(_)));
        assert_eq!(err.status_code(), 400);
        assert_eq!(completion.call_count(), 0);
        assert!(replier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_events_are_answered_in_order() {
        let completion = ScriptedCompletion::new(vec![Ok("one".into()), Ok("two".into())]);
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let body = payload(&[
            text_event("r1", "first"),
            r#"{"type":"follow","replyToken":"rf"}"#.to_string(),
            text_event("r2", "second"),
        ]);
        let outcome = relay.handle(&signed_request(&body)).await.unwrap();

        assert_eq!(
            outcome,
            RelayOutcome {
                status_code: 200,
                events: 3,
                text_messages: 2,
                replies_sent: 2,
                replies_failed: 0,
            }
        );
        assert_eq!(
            *completion.calls.lock().unwrap(),
            vec![
                ("first".to_string(), API_KEY.to_string()),
                ("second".to_string(), API_KEY.to_string()),
            ]
        );
        assert_eq!(
            *replier.sent.lock().unwrap(),
            vec![
                ("r1".to_string(), "one".to_string()),
                ("r2".to_string(), "two".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_completion_failure_aborts_batch() {
        let completion = ScriptedCompletion::new(vec![
            Err(CompletionError::RequestFailed("timeout".into())),
            Ok("never".into()),
        ]);
        let replier = RecordingReplier::default();
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let body = payload(&[text_event("r1", "first"), text_event("r2", "second")]);
        let err = relay.handle(&signed_request(&body)).await.unwrap_err();

        assert!(matches!(
            err,
            RelayError::CompletionFailed(CompletionError::RequestFailed(_))
        ));
        assert_eq!(err.status_code(), 500);
        assert_eq!(completion.call_count(), 1);
        assert!(replier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reply_failure_is_swallowed() {
        let completion = ScriptedCompletion::default();
        let replier = RecordingReplier {
            fail: true,
            ..RecordingReplier::default()
        };
        let relay = WebhookRelay::new(SECRET, API_KEY, &completion, &replier);

        let body = payload(&[text_event("r1", "first"), text_event("r2", "second")]);
        let outcome = relay.handle(&signed_request(&body)).await.unwrap();

        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.replies_sent, 0);
        assert_eq!(outcome.replies_failed, 2);
        assert_eq!(completion.call_count(), 2);
    }
}
