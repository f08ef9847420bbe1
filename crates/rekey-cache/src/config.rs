//! Cache configuration.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Default record lifetime (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default cache file name.
pub const DEFAULT_CACHE_FILE: &str = "public_keys.json";

/// Where the cache lives and how long records stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file. Its parent directory is created if missing.
    pub path: PathBuf,
    /// Lifetime of a record from the moment it is stored.
    #[serde(with = "secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_FILE)
    }
}

impl CacheConfig {
    /// Cache at `path` with the default TTL.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ttl: DEFAULT_TTL }
    }

    /// Same configuration with a different TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace an empty path or zero TTL with the defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.path.as_os_str().is_empty() {
            self.path = PathBuf::from(DEFAULT_CACHE_FILE);
        }
        if self.ttl.is_zero() {
            self.ttl = DEFAULT_TTL;
        }
        self
    }
}

/// TTL as integer seconds in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
