//! Lazy re-encryption workflow.

use std::{collections::BTreeMap, sync::Arc};

use rekey_core::{Context, CryptoProvider, Environment, KeyUsageInfo, SystemEnv};
use rekey_directory::{ReqwestTransport, Transport};
use rekey_manager::KeyManager;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{MigrationError, RotationDetector, RotationInfo};

/// Recipients used for detection and re-encryption when a request names none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Identities stored ciphertext is encrypted to.
    pub default_recipients: Vec<String>,
}

impl MigrationConfig {
    /// Configuration encrypting to `recipients`.
    pub fn new<S: Into<String>>(recipients: impl IntoIterator<Item = S>) -> Self {
        Self { default_recipients: recipients.into_iter().map(Into::into).collect() }
    }
}

/// Plaintext to encrypt to current keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReEncryptRequest {
    /// Data to encrypt.
    pub plaintext: Vec<u8>,
    /// Recipients, or `None` for [`MigrationConfig::default_recipients`].
    pub recipients: Option<Vec<String>>,
}

/// Successful decryption plus the advisory rotation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    /// Recovered plaintext.
    pub plaintext: Vec<u8>,
    /// Keys the crypto provider reported using.
    pub key_usage: KeyUsageInfo,
    /// Rotation check result. `Unknown` if the check itself failed.
    pub rotation: RotationInfo,
}

/// What happened after decryption.
#[derive(Debug)]
pub enum ReEncryption {
    /// No rotation was detected; nothing was encrypted.
    NotNeeded,
    /// Rotation was detected and the plaintext was encrypted to current keys.
    Performed(Vec<u8>),
    /// Rotation was detected but re-encryption failed.
    Failed(MigrationError),
}

/// Result of the lazy workflow for one item.
#[derive(Debug)]
pub struct MigrationResult {
    /// Recovered plaintext.
    pub plaintext: Vec<u8>,
    /// Rotation check result.
    pub rotation: RotationInfo,
    /// Re-encryption outcome, consistent with `rotation.needs_reencryption`.
    pub reencryption: ReEncryption,
}

impl MigrationResult {
    /// True when the decryption key was found to be retired.
    pub fn rotation_detected(&self) -> bool {
        self.rotation.needs_reencryption
    }

    /// Replacement ciphertext, if re-encryption ran and succeeded.
    pub fn new_ciphertext(&self) -> Option<&[u8]> {
        match &self.reencryption {
            ReEncryption::Performed(ciphertext) => Some(ciphertext),
            ReEncryption::NotNeeded | ReEncryption::Failed(_) => None,
        }
    }

    /// Re-encryption failure, if any.
    pub fn error(&self) -> Option<&MigrationError> {
        match &self.reencryption {
            ReEncryption::Failed(err) => Some(err),
            ReEncryption::NotNeeded | ReEncryption::Performed(_) => None,
        }
    }
}

/// Counts over a batch migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    /// Items processed.
    pub total: usize,
    /// Items that now have a replacement ciphertext.
    pub reencrypted: usize,
    /// Items left as they were because no rotation was detected.
    pub unchanged: usize,
    /// Items that failed to decrypt or to re-encrypt.
    pub failed: usize,
}

impl MigrationSummary {
    /// Tally per-item results.
    pub fn from_results<K>(results: &BTreeMap<K, Result<MigrationResult, MigrationError>>) -> Self {
        let mut summary = Self { total: results.len(), ..Self::default() };
        for result in results.values() {
            match result.as_ref().map(|r| &r.reencryption) {
                Ok(ReEncryption::NotNeeded) => summary.unchanged += 1,
                Ok(ReEncryption::Performed(_)) => summary.reencrypted += 1,
                Ok(ReEncryption::Failed(_)) | Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Decrypts stored ciphertext and re-encrypts it when its key has rotated.
pub struct LazyReEncryptor<C, T = ReqwestTransport, E = SystemEnv>
where
    C: CryptoProvider,
    T: Transport,
    E: Environment,
{
    crypto: C,
    manager: Arc<KeyManager<T, E>>,
    detector: RotationDetector<T, E>,
    config: MigrationConfig,
}

impl<C, T, E> LazyReEncryptor<C, T, E>
where
    C: CryptoProvider,
    T: Transport,
    E: Environment,
{
    /// Workflow over `crypto`, resolving keys through `manager`.
    pub fn new(crypto: C, manager: Arc<KeyManager<T, E>>, config: MigrationConfig) -> Self {
        let detector = RotationDetector::new(Arc::clone(&manager));
        Self { crypto, manager, detector, config }
    }

    /// Recipient configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Rotation detector sharing this workflow's manager.
    pub fn detector(&self) -> &RotationDetector<T, E> {
        &self.detector
    }

    /// Decrypt `ciphertext` and check its key for rotation.
    ///
    /// Only decryption can fail. A failed rotation check is logged and
    /// reported as [`RotationInfo::unknown`] alongside the plaintext.
    pub async fn decrypt_with_rotation_check(
        &self,
        ctx: &Context,
        ciphertext: &[u8],
    ) -> Result<DecryptOutcome, MigrationError> {
        let decrypted = self.crypto.decrypt(ciphertext).map_err(MigrationError::Decrypt)?;
        let usage = decrypted.key_usage;

        let rotation = match self
            .detector
            .detect_rotation(ctx, &usage, &self.config.default_recipients)
            .await
        {
            Ok(info) => info,
            Err(err) => {
                warn!(key_id = %usage.receiver_key_id, "rotation check failed: {err}");
                RotationInfo::unknown(
                    &usage,
                    self.manager.cache().env().now(),
                    format!("rotation check failed: {err}"),
                )
            },
        };

        Ok(DecryptOutcome { plaintext: decrypted.plaintext, key_usage: usage, rotation })
    }

    /// Encrypt `request.plaintext` to the current keys of its recipients.
    ///
    /// Never decrypts anything.
    pub async fn re_encrypt(
        &self,
        ctx: &Context,
        request: ReEncryptRequest,
    ) -> Result<Vec<u8>, MigrationError> {
        let recipients =
            request.recipients.as_deref().unwrap_or(self.config.default_recipients.as_slice());
        if recipients.is_empty() {
            return Err(MigrationError::NoRecipients);
        }

        let keys = self
            .manager
            .get_public_keys(ctx, recipients)
            .await
            .map_err(MigrationError::KeyLookup)?;
        self.crypto.encrypt(&request.plaintext, &keys).map_err(MigrationError::Encrypt)
    }

    /// Decrypt, check for rotation and re-encrypt only if the decryption key
    /// was retired.
    ///
    /// # Errors
    ///
    /// Only a decryption failure is an `Err`. A re-encryption failure is
    /// reported as [`ReEncryption::Failed`] with the plaintext still present.
    #[instrument(skip_all, fields(len = ciphertext.len()))]
    pub async fn perform_lazy_reencryption(
        &self,
        ctx: &Context,
        ciphertext: &[u8],
    ) -> Result<MigrationResult, MigrationError> {
        let outcome = self.decrypt_with_rotation_check(ctx, ciphertext).await?;

        if !outcome.rotation.needs_reencryption {
            return Ok(MigrationResult {
                plaintext: outcome.plaintext,
                rotation: outcome.rotation,
                reencryption: ReEncryption::NotNeeded,
            });
        }

        let request = ReEncryptRequest { plaintext: outcome.plaintext.clone(), recipients: None };
        let reencryption = match self.re_encrypt(ctx, request).await {
            Ok(ciphertext) => {
                info!(key_id = %outcome.key_usage.receiver_key_id, "re-encrypted to current keys");
                ReEncryption::Performed(ciphertext)
            },
            Err(err) => {
                warn!("re-encryption failed: {err}");
                ReEncryption::Failed(err)
            },
        };

        Ok(MigrationResult {
            plaintext: outcome.plaintext,
            rotation: outcome.rotation,
            reencryption,
        })
    }

    /// Run [`perform_lazy_reencryption`](Self::perform_lazy_reencryption)
    /// on every item independently.
    ///
    /// One item failing never stops the others.
    pub async fn migrate_encrypted_data(
        &self,
        ctx: &Context,
        items: BTreeMap<String, Vec<u8>>,
    ) -> BTreeMap<String, Result<MigrationResult, MigrationError>> {
        let mut results = BTreeMap::new();
        for (identity, ciphertext) in items {
            let result = self.perform_lazy_reencryption(ctx, &ciphertext).await;
            results.insert(identity, result);
        }

        let summary = MigrationSummary::from_results(&results);
        info!(
            total = summary.total,
            reencrypted = summary.reencrypted,
            unchanged = summary.unchanged,
            failed = summary.failed,
            "migration finished"
        );
        results
    }
}
