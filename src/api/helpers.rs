//! API Gateway proxy response builders.

use serde_json::{Value, json};

use crate::errors::RelayError;

/// Returns a 200 OK response with an empty JSON body.
#[must_use]
pub fn ok_empty() -> Value {
    json!({ "statusCode": 200, "body": "{}" })
}

/// Returns an error response with the given status code and message.
#[must_use]
pub fn err_response(status_code: u16, message: &str) -> Value {
    json!({
        "statusCode": status_code,
        "body": json!({ "error": message }).to_string()
    })
}

/// Maps a relay error to its proxy response.
///
/// Internal failures get a generic message so secret names and upstream
/// errors stay in the logs only.
#[must_use]
pub fn relay_error_response(error: &RelayError) -> Value {
    let status = error.status_code();
    let message = match error {
        RelayError::SignatureInvalid => "Invalid signature".to_string(),
        RelayError::ParseFailed(msg) => format!("Parse Error: {msg}"),
        _ => "Internal Server Error".to_string(),
    };
    err_response(status, &message)
}
