use std::time::Duration;

use garde::Validate;
use serde::Deserialize;

use crate::services::auth::{Authorizer, OAuth, SimpleAuth};
use crate::services::poll::PollSchedule;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudsightapi.com";
pub const DEFAULT_LOCALE: &str = "en-US";

const ENV_PREFIX: &str = "CLOUDSIGHT_";

/// Environment configuration (`CLOUDSIGHT_*` variables, `.env` honored).
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// API key. Used alone for simple auth, or as the OAuth consumer key.
    pub api_key: String,

    /// OAuth consumer secret. When set, requests are OAuth-signed.
    #[serde(default)]
    pub api_secret: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Locale sent when a request does not set one.
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_initial_poll_wait_secs")]
    pub initial_poll_wait_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_poll_timeout_secs() -> u64 {
    600
}

fn default_initial_poll_wait_secs() -> u64 {
    4
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_user_agent() -> String {
    format!("cloudsight-rust v{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load from explicit `(name, value)` pairs using the same prefix rules.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: AppConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Ok(config)
    }

    /// Validated client settings built from the environment values.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let config = ClientConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            locale: self.locale.clone(),
            schedule: PollSchedule {
                timeout: Duration::from_secs(self.poll_timeout_secs),
                initial_wait: Duration::from_secs(self.initial_poll_wait_secs),
                interval: Duration::from_secs(self.poll_interval_secs),
            },
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// OAuth when a secret is configured, simple key auth otherwise.
    pub fn authorizer(&self) -> Box<dyn Authorizer> {
        match self.api_secret.as_deref().filter(|secret| !secret.is_empty()) {
            Some(secret) => Box::new(OAuth::new(&self.api_key, secret)),
            None => Box::new(SimpleAuth::new(&self.api_key)),
        }
    }
}

/// Settings handed to [`ClassificationClient`] at construction.
///
/// [`ClassificationClient`]: crate::services::classifier::ClassificationClient
#[derive(Debug, Clone, Validate)]
pub struct ClientConfig {
    /// Service root; endpoints are `/image_requests` and `/image_responses`.
    #[garde(url)]
    pub base_url: String,

    /// Default `image_request[locale]`.
    #[garde(length(min = 2, max = 16))]
    pub locale: String,

    /// Schedule used by `wait`.
    #[garde(custom(validate_schedule))]
    pub schedule: PollSchedule,

    #[garde(length(min = 1))]
    pub user_agent: String,

    #[garde(skip)]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            locale: default_locale(),
            schedule: PollSchedule::default(),
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

impl ClientConfig {
    pub fn requests_url(&self) -> String {
        format!("{}/image_requests", self.base_url)
    }

    pub fn responses_url(&self, token: &str) -> String {
        format!("{}/image_responses/{}", self.base_url, token)
    }

    pub fn repost_url(&self, token: &str) -> String {
        format!("{}/image_requests/{}/repost", self.base_url, token)
    }
}

fn validate_schedule(schedule: &PollSchedule, _ctx: &()) -> garde::Result {
    if schedule.interval.is_zero() {
        return Err(garde::Error::new("poll interval must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid client configuration: {0}")]
    Invalid(#[from] garde::Report),
}
