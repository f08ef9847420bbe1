//! The cache itself.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use parking_lot::RwLock;
use rekey_core::{DirectoryKey, Environment, PublicKeyRecord, SystemEnv};
use tracing::debug;

use crate::{
    CacheConfig, CacheError,
    file::{self, Entries},
};

/// Record counts at the moment of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Records stored, expired or not.
    pub total: usize,
    /// Records still within their TTL.
    pub valid: usize,
    /// Records past their TTL but not yet pruned.
    pub expired: usize,
}

/// File-backed identity → public key cache.
///
/// One reader/writer lock guards the map. Readers run concurrently; a writer
/// holds the lock across staging, persisting and committing, so writes are
/// serialized and a failed write leaves both memory and disk as they were.
pub struct KeyCache<E: Environment = SystemEnv> {
    path: PathBuf,
    ttl: Duration,
    env: E,
    entries: RwLock<Entries>,
}

impl KeyCache {
    /// Open the cache described by `config` using the system clock.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        Self::with_env(config, SystemEnv::new())
    }
}

impl<E: Environment> KeyCache<E> {
    /// Open the cache described by `config` with a caller-supplied clock.
    ///
    /// Creates the containing directory if missing and loads the file if
    /// present.
    ///
    /// # Errors
    ///
    /// - `CreateDir` if the directory cannot be created
    /// - `Read` / `Parse` if an existing file cannot be read or is malformed.
    ///   A malformed file is never treated as empty.
    pub fn with_env(config: CacheConfig, env: E) -> Result<Self, CacheError> {
        let config = config.normalized();
        file::ensure_dir(file::parent_dir(&config.path))?;
        let entries = file::load(&config.path)?;

        debug!(path = %config.path.display(), records = entries.len(), "cache opened");

        Ok(Self { path: config.path, ttl: config.ttl, env, entries: RwLock::new(entries) })
    }

    /// Cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clock used for timestamps and expiry.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Lifetime given to newly stored records.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired record for `identity`.
    ///
    /// An expired record reads as absent but stays stored until
    /// [`prune_expired`](Self::prune_expired).
    pub fn get(&self, identity: &str) -> Option<PublicKeyRecord> {
        let now = self.env.now();
        self.entries.read().get(identity).filter(|record| !record.is_expired_at(now)).cloned()
    }

    /// Store a key for `identity`, replacing any previous record.
    pub fn set(
        &self,
        identity: &str,
        public_key: &str,
        key_id: &str,
    ) -> Result<PublicKeyRecord, CacheError> {
        let key = DirectoryKey::new(identity, public_key, key_id);
        let record = PublicKeyRecord::new(key, self.env.now(), self.ttl);

        self.mutate(|entries| {
            entries.insert(record.identity.clone(), record.clone());
            true
        })?;

        debug!(identity, key_id, "cached public key");
        Ok(record)
    }

    /// Store several keys with a single write.
    ///
    /// Either every key is persisted or none is.
    pub fn set_many(&self, keys: &[DirectoryKey]) -> Result<Vec<PublicKeyRecord>, CacheError> {
        let now = self.env.now();
        let records: Vec<PublicKeyRecord> =
            keys.iter().map(|key| PublicKeyRecord::new(key.clone(), now, self.ttl)).collect();

        self.mutate(|entries| {
            for record in &records {
                entries.insert(record.identity.clone(), record.clone());
            }
            true
        })?;

        debug!(count = records.len(), "cached public keys");
        Ok(records)
    }

    /// Remove `identity`. Returns whether a record was present.
    ///
    /// Nothing is written when the identity is not cached.
    pub fn delete(&self, identity: &str) -> Result<bool, CacheError> {
        self.mutate(|entries| entries.remove(identity).is_some())
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.mutate(|entries| {
            entries.clear();
            true
        })?;
        Ok(())
    }

    /// Physically remove expired records. Returns how many were removed.
    ///
    /// Nothing is written when no record has expired.
    pub fn prune_expired(&self) -> Result<usize, CacheError> {
        let now = self.env.now();
        let mut removed = 0;
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|_, record| !record.is_expired_at(now));
            removed = before - entries.len();
            removed > 0
        })?;

        if removed > 0 {
            debug!(removed, "pruned expired cache records");
        }
        Ok(removed)
    }

    /// Counts by full scan.
    pub fn stats(&self) -> CacheStats {
        let now = self.env.now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|record| record.is_expired_at(now)).count();
        CacheStats { total: entries.len(), valid: entries.len() - expired, expired }
    }

    /// Number of stored records, including expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Apply `change` to a copy of the map, persist it, then commit.
    ///
    /// `change` returns whether it modified anything; if not, nothing is
    /// written and the result is `Ok(false)`.
    fn mutate<F>(&self, change: F) -> Result<bool, CacheError>
    where
        F: FnOnce(&mut Entries) -> bool,
    {
        let mut entries = self.entries.write();
        let mut staged = entries.clone();
        if !change(&mut staged) {
            return Ok(false);
        }

        file::store(&self.path, &staged)?;
        *entries = staged;
        Ok(true)
    }
}

impl<E: Environment> std::fmt::Debug for KeyCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}
