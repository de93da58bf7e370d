use std::env;
use std::time::Duration;

use url::Url;

pub const DEFAULT_REGION: &str = "ap-northeast-1";
pub const DEFAULT_CHANNEL_SECRET_PARAM: &str = "LINE_CHANNEL_SECRET";
pub const DEFAULT_CHANNEL_ACCESS_TOKEN_PARAM: &str = "LINE_CHANNEL_ACCESS_TOKEN";
pub const DEFAULT_OPENAI_API_KEY_PARAM: &str = "OPEN_API_KEY";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
pub const DEFAULT_SSM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub region: String,
    pub channel_secret_param: String,
    pub channel_access_token_param: String,
    pub openai_api_key_param: String,
    pub openai_model: String,
    pub openai_endpoint: String,
    pub line_api_base: String,
    pub ssm_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            channel_secret_param: DEFAULT_CHANNEL_SECRET_PARAM.to_string(),
            channel_access_token_param: DEFAULT_CHANNEL_ACCESS_TOKEN_PARAM.to_string(),
            openai_api_key_param: DEFAULT_OPENAI_API_KEY_PARAM.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            line_api_base: DEFAULT_LINE_API_BASE.to_string(),
            ssm_timeout: Duration::from_secs(DEFAULT_SSM_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns an error if a URL or timeout variable is set but malformed.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source; unset variables
    /// fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL or timeout variable is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str, default: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        let region = lookup("SSM_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.region);

        let ssm_timeout = match lookup("SSM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| format!("SSM_TIMEOUT_SECS: {e}"))?,
            None => defaults.ssm_timeout,
        };

        Ok(Self {
            region,
            channel_secret_param: var("CHANNEL_SECRET_PARAM", defaults.channel_secret_param),
            channel_access_token_param: var(
                "CHANNEL_ACCESS_TOKEN_PARAM",
                defaults.channel_access_token_param,
            ),
            openai_api_key_param: var("OPENAI_API_KEY_PARAM", defaults.openai_api_key_param),
            openai_model: var("OPENAI_MODEL", defaults.openai_model),
            openai_endpoint: validate_url(
                "OPENAI_ENDPOINT",
                var("OPENAI_ENDPOINT", defaults.openai_endpoint),
            )?,
            line_api_base: validate_url(
                "LINE_API_BASE",
                var("LINE_API_BASE", defaults.line_api_base),
            )?
            .trim_end_matches('/')
            .to_string(),
            ssm_timeout,
        })
    }
}

fn validate_url(key: &str, value: String) -> Result<String, String> {
    let parsed = Url::parse(&value).map_err(|e| format!("{key}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(value),
        other => Err(format!("{key}: unsupported scheme '{other}'")),
    }
}
