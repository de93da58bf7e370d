//! linegpt - a LINE bot that answers text messages with ChatGPT.
//!
//! A single API Lambda receives LINE webhooks through API Gateway, verifies
//! the `x-line-signature` header, asks the `OpenAI` chat-completions API for a
//! reply to each text message and sends it back through the LINE reply API.
//!
//! # Architecture
//!
//! The system uses:
//! - AWS Lambda for serverless execution
//! - SSM Parameter Store for the channel secret, access token and API key
//! - reqwest for the `OpenAI` and LINE HTTP calls
//! - Tokio for async runtime
//!
//! # Example
//!
//! ```no_run
//! use linegpt::api::WebhookRelay;
//! use linegpt::clients::LlmClient;
//! use linegpt::core::models::InboundRequest;
//! use linegpt::line::LineClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     linegpt::setup_logging();
//!
//!     let completion = LlmClient::default();
//!     let replier = LineClient::new("https://api.line.me", "dummy_token".to_string());
//!     let relay = WebhookRelay::new("dummy_secret", "dummy_openai_key", &completion, &replier);
//!
//!     let request = InboundRequest {
//!         method: "POST".to_string(),
//!         path: "/callback".to_string(),
//!         headers: Default::default(),
//!         body: r#"{"events":[]}"#.to_string(),
//!     };
//!
//!     match relay.handle(&request).await {
//!         Ok(outcome) => println!("Handled {} events", outcome.events),
//!         Err(e) => println!("Rejected with {}: {}", e.status_code(), e),
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod clients;
pub mod core;
pub mod errors;
pub mod line;

pub use errors::{CompletionError, RelayError};

/// Configure structured logging with JSON format for AWS Lambda environments.
///
/// This function sets up tracing-subscriber with a JSON formatter suitable for
/// `CloudWatch` Logs integration. It should be called once at startup; later
/// calls are ignored.
///
/// # Example
///
/// ```
/// linegpt::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
