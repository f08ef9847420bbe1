//! Rotation detection.

use std::sync::Arc;

use rekey_core::{Context, Environment, KeyUsageInfo, SystemEnv};
use rekey_directory::{ReqwestTransport, Transport};
use rekey_manager::{KeyManager, ManagerError};
use tracing::{debug, info};

use crate::RotationInfo;

/// Compares the key that decrypted a message with the recipients' current
/// published keys.
///
/// Holds no state of its own. Current keys are always fetched fresh through
/// [`KeyManager::refresh_users`], which also updates the cache.
pub struct RotationDetector<T: Transport = ReqwestTransport, E: Environment = SystemEnv> {
    manager: Arc<KeyManager<T, E>>,
}

impl<T: Transport, E: Environment> Clone for RotationDetector<T, E> {
    fn clone(&self) -> Self {
        Self { manager: Arc::clone(&self.manager) }
    }
}

impl<T: Transport, E: Environment> RotationDetector<T, E> {
    /// Detector resolving keys through `manager`.
    pub fn new(manager: Arc<KeyManager<T, E>>) -> Self {
        Self { manager }
    }

    /// Check whether the decryption key in `usage` is still current for any
    /// of `recipients`.
    ///
    /// Key ids compare ignoring ASCII case. An empty recipient list yields
    /// [`RotationInfo::no_information`].
    ///
    /// # Errors
    ///
    /// Whatever the refresh lookup returns. Recipients are refreshed as one
    /// batch, so a single recipient missing from the directory fails the
    /// whole check with a not-found error even when another recipient still
    /// holds the key. Callers that must not fail on detection turn this into
    /// [`RotationInfo::unknown`], and should drop departed identities from
    /// their recipient list.
    pub async fn detect_rotation(
        &self,
        ctx: &Context,
        usage: &KeyUsageInfo,
        recipients: &[String],
    ) -> Result<RotationInfo, ManagerError> {
        let now = self.manager.cache().env().now();

        if recipients.is_empty() {
            debug!("no recipients to check for rotation");
            return Ok(RotationInfo::no_information(usage, now));
        }
        if usage.receiver_key_id.is_empty() {
            return Ok(RotationInfo::unknown(usage, now, "decryption key id not reported"));
        }

        let current = self.manager.refresh_users(ctx, recipients).await?;
        let still_current =
            current.iter().any(|record| record.key_id.eq_ignore_ascii_case(&usage.receiver_key_id));

        if still_current {
            debug!(key_id = %usage.receiver_key_id, "decryption key still current");
            return Ok(RotationInfo::current(usage, now));
        }

        let mut affected: Vec<String> = Vec::with_capacity(recipients.len());
        for identity in recipients {
            if !affected.contains(identity) {
                affected.push(identity.clone());
            }
        }

        info!(
            key_id = %usage.receiver_key_id,
            recipients = affected.len(),
            "key rotation detected"
        );
        Ok(RotationInfo::retired(usage, now, affected))
    }
}
