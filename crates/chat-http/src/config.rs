//! Environment-backed configuration for the request client.

use std::{env, time::Duration};

use chat_core::RetryPolicy;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.ermis.network/uss/v1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_RETRY_STEP_MS: u64 = 2_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 25_000;

/// Runtime configuration for [`crate::ResilientRequestClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API key injected as the `api_key` query parameter.
    pub api_key: String,
    /// Service base URL used by the auth endpoints.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Optional identity header override.
    pub user_agent: Option<String>,
    /// Token-expiry backoff and optional retry cap.
    pub retry_policy: RetryPolicy,
}

impl ClientConfig {
    /// Config with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            user_agent: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_key = optional_trimmed_env("CHAT_API_KEY", &mut lookup)
            .ok_or(ConfigError::Missing { key: "CHAT_API_KEY" })?;

        let base_url = match optional_trimmed_env("CHAT_BASE_URL", &mut lookup) {
            Some(raw) => {
                Url::parse(&raw).map_err(|err| ConfigError::InvalidValue {
                    key: "CHAT_BASE_URL",
                    value: raw.clone(),
                    reason: err.to_string(),
                })?;
                raw
            }
            None => DEFAULT_BASE_URL.to_owned(),
        };

        let timeout_ms = parse_u64_with_default(
            "CHAT_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
            &mut lookup,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_REQUEST_TIMEOUT_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        let user_agent = optional_trimmed_env("CHAT_USER_AGENT", &mut lookup);
        let max_token_retries = parse_optional_u32("CHAT_MAX_TOKEN_RETRIES", &mut lookup)?;
        let retry_step_ms =
            parse_u64_with_default("CHAT_RETRY_STEP_MS", DEFAULT_RETRY_STEP_MS, &mut lookup)?;
        let retry_max_delay_ms = parse_u64_with_default(
            "CHAT_RETRY_MAX_DELAY_MS",
            DEFAULT_RETRY_MAX_DELAY_MS,
            &mut lookup,
        )?;

        Ok(Self {
            api_key,
            base_url,
            request_timeout: Duration::from_millis(timeout_ms),
            user_agent,
            retry_policy: RetryPolicy::new(retry_step_ms, retry_max_delay_ms)
                .with_max_token_retries(max_token_retries),
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required {key}")]
    Missing { key: &'static str },
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u64_with_default<F>(key: &'static str, default: u64, lookup: &mut F) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value.parse::<u64>().map_err(|err| ConfigError::InvalidValue {
        key,
        value,
        reason: err.to_string(),
    })
}

fn parse_optional_u32<F>(key: &'static str, lookup: &mut F) -> Result<Option<u32>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}
