// Execution service client configuration
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8910";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server-side variable, preferred
pub const ENV_EXECUTOR_URL: &str = "EXECUTOR_URL";
/// Client-visible fallback
pub const ENV_PUBLIC_EXECUTOR_URL: &str = "NEXT_PUBLIC_EXECUTOR_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "EXECUTOR_POLL_INTERVAL_MS";
pub const ENV_TIMEOUT_MS: &str = "EXECUTOR_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer number of milliseconds, got {value:?}")]
    InvalidMillis { var: &'static str, value: String },
}

/// Client configuration, injected into the executor client explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Default delay between status polls
    pub poll_interval: Duration,
    /// Default overall wall-clock budget for submit + polling
    pub timeout: Duration,
    /// Optional cap on a single HTTP round-trip
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ExecutorConfig {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            request_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = [ENV_EXECUTOR_URL, ENV_PUBLIC_EXECUTOR_URL]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(base_url.trim());

        if let Some(ms) = parse_millis(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = ms;
        }
        if let Some(ms) = parse_millis(&lookup, ENV_TIMEOUT_MS)? {
            config.timeout = ms;
        }

        Ok(config)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }
}

/// Strip every trailing slash
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}

fn parse_millis<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
            _ => Err(ConfigError::InvalidMillis { var, value }),
        },
    }
}
