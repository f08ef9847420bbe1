//! Manager configuration.

use rekey_cache::CacheConfig;
use rekey_directory::ClientConfig;
use serde::Deserialize;

/// Whether the manager may reach the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Cache misses are fetched from the directory.
    #[default]
    Online,
    /// Only the local cache is consulted.
    Offline,
}

/// Everything needed to build a production [`KeyManager`](crate::KeyManager).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Cache file and TTL.
    pub cache: CacheConfig,
    /// Directory client settings. Ignored in offline mode.
    pub client: ClientConfig,
    /// Online or offline.
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn deserializes_nested_sections() {
        let config: ManagerConfig = serde_json::from_str(
            r#"{
                "mode": "offline",
                "cache": { "path": "/var/lib/rekey/keys.json", "ttl": 3600 },
                "client": { "max_retries": 0 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Offline);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.client.max_retries, 0);
        assert_eq!(config.client.endpoint, rekey_directory::DEFAULT_ENDPOINT);
    }

    #[test]
    fn online_by_default() {
        assert_eq!(ManagerConfig::default().mode, Mode::Online);
    }
}
