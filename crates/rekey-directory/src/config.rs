//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default directory base URL.
pub const DEFAULT_ENDPOINT: &str = "https://keybase.io";

/// Path of the batched lookup endpoint, appended to the base URL.
pub const LOOKUP_PATH: &str = "/_/api/1.0/user/lookup.json";

/// Field selector sent with every lookup.
pub const LOOKUP_FIELDS: &str = "basics,public_keys";

/// Client identification sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("rekey/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Directory client configuration.
///
/// Immutable once a client is built from it. Unusable values are replaced
/// with defaults by [`normalized`](Self::normalized) at construction, never
/// at call time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the directory service.
    pub endpoint: String,
    /// Per-request timeout.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    #[serde(with = "millis")]
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Configuration with every default applied.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Same configuration pointing at `endpoint`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace an empty endpoint, zero timeout or zero retry delay with the
    /// defaults and strip trailing slashes from the endpoint.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let trimmed = self.endpoint.trim().trim_end_matches('/');
        self.endpoint =
            if trimmed.is_empty() { DEFAULT_ENDPOINT.to_string() } else { trimmed.to_string() };
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        self
    }

    /// Full lookup URL.
    pub fn lookup_url(&self) -> String {
        format!("{}{LOOKUP_PATH}", self.endpoint)
    }
}

/// Durations as integer milliseconds in config files.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
