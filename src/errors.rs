use thiserror::Error;

/// Value the parameter store lookup reports in place of a secret when the
/// fetch fails.
pub const FETCH_ERROR_SENTINEL: &str = "Fetch Error";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{}: {name}: {message}", FETCH_ERROR_SENTINEL)]
    SecretFetchFailed { name: String, message: String },

    #[error("Invalid LINE signature")]
    SignatureInvalid,

    #[error("Failed to parse LINE webhook: {0}")]
    ParseFailed(String),

    #[error("Failed to get completion: {0}")]
    CompletionFailed(#[from] CompletionError),

    #[error("Failed to send LINE reply: {0}")]
    ReplySendFailed(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl RelayError {
    /// HTTP status reported back to the webhook caller.
    ///
    /// A bad signature is the caller's fault and gets a 401, a payload that
    /// cannot be parsed gets a 400; everything else is an internal failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::SignatureInvalid => 401,
            RelayError::ParseFailed(_) => 400,
            RelayError::SecretFetchFailed { .. }
            | RelayError::CompletionFailed(_)
            | RelayError::ReplySendFailed(_)
            | RelayError::ConfigError(_) => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OpenAI API request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to (de)serialize OpenAI payload: {0}")]
    MarshalFailed(String),

    #[error("OpenAI API returned no choices")]
    EmptyCompletion,

    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        CompletionError::RequestFailed(error.to_string())
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(error: serde_json::Error) -> Self {
        CompletionError::MarshalFailed(error.to_string())
    }
}
