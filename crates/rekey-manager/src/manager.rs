//! Cache-first key resolution.

use std::collections::{HashMap, HashSet};

use rekey_cache::{CacheStats, KeyCache};
use rekey_core::{Context, DirectoryKey, Environment, PublicKeyRecord, SystemEnv, validate_identity};
use rekey_directory::{DirectoryClient, DirectoryError, ReqwestTransport, Transport};
use tracing::{debug, instrument};

use crate::{ManagerConfig, ManagerError, Mode};

/// Where misses go.
enum Source<T: Transport, E: Environment> {
    Online(DirectoryClient<T, E>),
    Offline,
}

/// Resolves identities to public keys, cache first.
///
/// A failed lookup never touches the cache: records are stored only after a
/// fetch has fully succeeded.
pub struct KeyManager<T: Transport = ReqwestTransport, E: Environment = SystemEnv> {
    source: Source<T, E>,
    cache: KeyCache<E>,
}

impl KeyManager {
    /// Build the production stack described by `config`.
    pub fn open(config: ManagerConfig) -> Result<Self, ManagerError> {
        let cache = KeyCache::open(config.cache)?;
        let source = match config.mode {
            Mode::Online => Source::Online(DirectoryClient::new(config.client)?),
            Mode::Offline => Source::Offline,
        };
        Ok(Self { source, cache })
    }
}

impl<E: Environment> KeyManager<ReqwestTransport, E> {
    /// Manager restricted to `cache`. Never touches the network.
    pub fn offline(cache: KeyCache<E>) -> Self {
        Self { source: Source::Offline, cache }
    }
}

impl<T: Transport, E: Environment> KeyManager<T, E> {
    /// Online manager fetching misses through `client`.
    pub fn new(client: DirectoryClient<T, E>, cache: KeyCache<E>) -> Self {
        Self { source: Source::Online(client), cache }
    }

    /// Mode fixed at construction.
    pub fn mode(&self) -> Mode {
        match self.source {
            Source::Online(_) => Mode::Online,
            Source::Offline => Mode::Offline,
        }
    }

    /// True in offline mode.
    pub fn is_offline(&self) -> bool {
        self.mode() == Mode::Offline
    }

    /// Underlying cache.
    pub fn cache(&self) -> &KeyCache<E> {
        &self.cache
    }

    /// Directory client, absent in offline mode.
    pub fn client(&self) -> Option<&DirectoryClient<T, E>> {
        match &self.source {
            Source::Online(client) => Some(client),
            Source::Offline => None,
        }
    }

    /// Current key for `identity`, from cache if valid.
    ///
    /// A miss issues a one-identity lookup and caches the result before
    /// returning it.
    #[instrument(skip(self, ctx))]
    pub async fn get_public_key(
        &self,
        ctx: &Context,
        identity: &str,
    ) -> Result<PublicKeyRecord, ManagerError> {
        validate_identity(identity).map_err(DirectoryError::from)?;

        if let Some(record) = self.cache.get(identity) {
            debug!("cache hit");
            return Ok(record);
        }
        debug!("cache miss");

        let client = self.online(&[identity])?;
        let key = client.lookup_user(ctx, identity).await?;
        Ok(self.cache.set(&key.identity, &key.public_key, &key.key_id)?)
    }

    /// Current keys for `identities`, in the order given.
    ///
    /// Valid cached records are used as-is. Everything else is fetched with
    /// at most one batched lookup and cached before the result is assembled.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty list or a malformed identity
    /// - `NotFound` naming every identity that could not be resolved. In
    ///   offline mode that is every cache miss.
    /// - Any lookup or cache failure; the cache is unchanged in that case
    #[instrument(skip_all, fields(count = identities.len()))]
    pub async fn get_public_keys<S: AsRef<str>>(
        &self,
        ctx: &Context,
        identities: &[S],
    ) -> Result<Vec<PublicKeyRecord>, ManagerError> {
        validate_batch(identities)?;

        let mut resolved: HashMap<&str, PublicKeyRecord> = HashMap::new();
        let mut to_fetch: Vec<&str> = Vec::new();
        for identity in identities.iter().map(AsRef::as_ref) {
            if resolved.contains_key(identity) || to_fetch.contains(&identity) {
                continue;
            }
            match self.cache.get(identity) {
                Some(record) => {
                    resolved.insert(identity, record);
                },
                None => to_fetch.push(identity),
            }
        }
        debug!(hits = resolved.len(), misses = to_fetch.len(), "partitioned batch");

        if !to_fetch.is_empty() {
            let client = self.online(&to_fetch)?;
            let keys = client.lookup_users(ctx, &to_fetch).await?;
            for record in self.cache.set_many(&keys)? {
                if let Some(&identity) = to_fetch.iter().find(|id| **id == record.identity) {
                    resolved.insert(identity, record);
                }
            }
        }

        assemble(identities, &resolved)
    }

    /// Drop the cached record for `identity`. Returns whether one existed.
    pub fn invalidate_user(&self, identity: &str) -> Result<bool, ManagerError> {
        Ok(self.cache.delete(identity)?)
    }

    /// Drop every cached record.
    pub fn invalidate_all(&self) -> Result<(), ManagerError> {
        Ok(self.cache.clear()?)
    }

    /// Physically remove expired records. Returns how many were removed.
    pub fn prune_expired(&self) -> Result<usize, ManagerError> {
        Ok(self.cache.prune_expired()?)
    }

    /// Fetch `identity` from the directory regardless of the cache and store
    /// the result.
    pub async fn refresh_user(
        &self,
        ctx: &Context,
        identity: &str,
    ) -> Result<PublicKeyRecord, ManagerError> {
        let mut records = self.refresh_users(ctx, &[identity]).await?;
        records.pop().ok_or_else(|| {
            ManagerError::from(DirectoryError::not_found(format!("user {identity} not found")))
        })
    }

    /// Fetch `identities` from the directory regardless of the cache and
    /// store the results, in the order given.
    ///
    /// The fetched records replace the cached ones only after the whole
    /// lookup succeeded; on failure the previous records stay.
    ///
    /// # Errors
    ///
    /// `Network` in offline mode, otherwise as
    /// [`get_public_keys`](Self::get_public_keys).
    #[instrument(skip_all, fields(count = identities.len()))]
    pub async fn refresh_users<S: AsRef<str>>(
        &self,
        ctx: &Context,
        identities: &[S],
    ) -> Result<Vec<PublicKeyRecord>, ManagerError> {
        let Source::Online(client) = &self.source else {
            return Err(DirectoryError::network("refresh requires network access (offline mode)")
                .into());
        };
        validate_batch(identities)?;

        let keys: Vec<DirectoryKey> = client.lookup_users(ctx, identities).await?;
        let records = self.cache.set_many(&keys)?;
        debug!(refreshed = records.len(), "refreshed public keys");

        let resolved: HashMap<&str, PublicKeyRecord> = identities
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|id| records.iter().find(|r| r.identity == id).map(|r| (id, r.clone())))
            .collect();
        assemble(identities, &resolved)
    }

    /// Record counts from a full cache scan.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Directory client, or the offline `NotFound` naming `unresolved`.
    fn online(&self, unresolved: &[&str]) -> Result<&DirectoryClient<T, E>, ManagerError> {
        match &self.source {
            Source::Online(client) => Ok(client),
            Source::Offline => Err(DirectoryError::not_found(format!(
                "not cached (offline mode): {}",
                unresolved.join(", ")
            ))
            .into()),
        }
    }
}

fn validate_batch<S: AsRef<str>>(identities: &[S]) -> Result<(), ManagerError> {
    if identities.is_empty() {
        return Err(DirectoryError::invalid_input("no identities provided").into());
    }
    for identity in identities {
        validate_identity(identity.as_ref()).map_err(DirectoryError::from)?;
    }
    Ok(())
}

/// Records for `identities` in order, or `NotFound` naming every gap.
fn assemble<S: AsRef<str>>(
    identities: &[S],
    resolved: &HashMap<&str, PublicKeyRecord>,
) -> Result<Vec<PublicKeyRecord>, ManagerError> {
    let mut missing: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(identities.len());

    for identity in identities.iter().map(AsRef::as_ref) {
        match resolved.get(identity) {
            Some(record) => records.push(record.clone()),
            None if seen.insert(identity) => missing.push(identity),
            None => {},
        }
    }

    if missing.is_empty() {
        Ok(records)
    } else {
        Err(DirectoryError::not_found(format!("could not resolve: {}", missing.join(", "))).into())
    }
}

impl<T: Transport, E: Environment> std::fmt::Debug for KeyManager<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("mode", &self.mode())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
