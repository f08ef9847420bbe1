//! Public key records.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Key material for one identity as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryKey {
    /// Identity (username) the key belongs to.
    pub identity: String,
    /// Public key bundle, opaque to this workspace.
    pub public_key: String,
    /// Key id derived from the public key.
    pub key_id: String,
}

impl DirectoryKey {
    /// Create a new `DirectoryKey`.
    pub fn new(
        identity: impl Into<String>,
        public_key: impl Into<String>,
        key_id: impl Into<String>,
    ) -> Self {
        Self { identity: identity.into(), public_key: public_key.into(), key_id: key_id.into() }
    }
}

/// A cached resolution of an identity to its public key.
///
/// # Invariants
///
/// - `expires_at >= fetched_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Identity this record resolves.
    #[serde(rename = "username")]
    pub identity: String,
    /// Public key bundle.
    pub public_key: String,
    /// Key id of `public_key`.
    pub key_id: String,
    /// When the key was fetched from the directory.
    pub fetched_at: DateTime<Utc>,
    /// When the record stops being served from cache.
    pub expires_at: DateTime<Utc>,
}

impl PublicKeyRecord {
    /// Build a record fetched at `fetched_at` that lives for `ttl`.
    ///
    /// A TTL too large to represent saturates at the maximum timestamp.
    pub fn new(key: DirectoryKey, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            identity: key.identity,
            public_key: key.public_key,
            key_id: key.key_id,
            fetched_at,
            expires_at,
        }
    }

    /// True once `now` has reached the expiry timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Key material without timestamps.
    pub fn to_directory_key(&self) -> DirectoryKey {
        DirectoryKey::new(&self.identity, &self.public_key, &self.key_id)
    }
}
