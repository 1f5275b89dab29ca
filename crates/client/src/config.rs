//! Client configuration.
//!
//! Values are validated once, when the configuration is loaded. The poller and
//! dispatcher trust what they are given.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api-key.fusionbrain.ai";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_ASYNC_POOL_SIZE: usize = 1;

const ENV_BASE_URL: &str = "FUSIONBRAIN_BASE_URL";
const ENV_API_KEY: &str = "FUSIONBRAIN_API_KEY";
const ENV_API_SECRET: &str = "FUSIONBRAIN_API_SECRET";
const ENV_MAX_RETRIES: &str = "FUSIONBRAIN_MAX_RETRIES";
const ENV_POLL_INTERVAL: &str = "FUSIONBRAIN_POLL_INTERVAL";
const ENV_ASYNC_POOL_SIZE: &str = "FUSIONBRAIN_ASYNC_POOL_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Polling schedule consumed by the completion poller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Status queries allowed after the first one before giving up.
    pub max_retries: u32,
    /// Fixed wait before each retry.
    pub poll_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_retries: u32, poll_interval: Duration) -> Self {
        Self {
            max_retries,
            poll_interval,
        }
    }

    /// Upper bound on time spent in retries (initial delay excluded).
    pub fn max_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_retries)
    }
}

/// Connection and polling settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub max_retries: u32,
    pub poll_interval: Duration,
    /// Number of waits that may poll concurrently.
    pub async_pool_size: usize,
}

impl core::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("poll_interval", &self.poll_interval)
            .field("async_pool_size", &self.async_pool_size)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            async_pool_size: DEFAULT_ASYNC_POOL_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_async_pool_size(mut self, size: usize) -> Self {
        self.async_pool_size = size;
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_retries, self.poll_interval)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::Missing("api_secret"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval",
                reason: "must be positive".to_string(),
            });
        }
        if self.async_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "async_pool_size",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Load from `FUSIONBRAIN_*` environment variables, falling back to defaults
    /// for everything except the credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            cfg.base_url = url;
        }
        cfg.api_key = lookup(ENV_API_KEY).unwrap_or_default();
        cfg.api_secret = lookup(ENV_API_SECRET).unwrap_or_default();

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            cfg.max_retries = parse(ENV_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            cfg.poll_interval = Duration::from_secs(parse(ENV_POLL_INTERVAL, &raw)?);
        }
        if let Some(raw) = lookup(ENV_ASYNC_POOL_SIZE) {
            cfg.async_pool_size = parse(ENV_ASYNC_POOL_SIZE, &raw)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}
