//! Rotation report types.

use chrono::{DateTime, Utc};
use rekey_core::KeyUsageInfo;
use serde::Serialize;

/// What is known about a key that took part in decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Still the published key of a recipient.
    Current,
    /// No recipient publishes it anymore.
    Retired,
    /// Could not be determined.
    Unknown,
    /// There is no such key (anonymous sender).
    NotApplicable,
}

/// Outcome of one rotation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationInfo {
    /// Status of the key that decrypted the message.
    pub receiver_key: KeyStatus,
    /// Status of the sender's signing key. Never `Current` or `Retired`:
    /// there is no way to map a signing key back to an identity.
    pub sender_key: KeyStatus,
    /// Key id that performed decryption.
    pub decryption_key_id: String,
    /// Signing key id, if the sender was not anonymous.
    pub sender_key_id: Option<String>,
    /// Recipients the ciphertext should be re-encrypted for.
    pub affected_identities: Vec<String>,
    /// When the check ran.
    pub detected_at: DateTime<Utc>,
    /// Human-readable explanation, absent when nothing notable was found.
    pub reason: Option<String>,
    /// True only when the receiver key is known to be retired.
    pub needs_reencryption: bool,
}

impl RotationInfo {
    fn base(usage: &KeyUsageInfo, detected_at: DateTime<Utc>) -> Self {
        Self {
            receiver_key: KeyStatus::Unknown,
            sender_key: sender_status(usage),
            decryption_key_id: usage.receiver_key_id.clone(),
            sender_key_id: usage.sender_key_id.clone(),
            affected_identities: Vec::new(),
            detected_at,
            reason: None,
            needs_reencryption: false,
        }
    }

    /// Detection could not complete.
    pub fn unknown(
        usage: &KeyUsageInfo,
        detected_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self { reason: Some(reason.into()), ..Self::base(usage, detected_at) }
    }

    /// There were no recipients to compare against.
    pub fn no_information(usage: &KeyUsageInfo, detected_at: DateTime<Utc>) -> Self {
        Self::base(usage, detected_at)
    }

    /// The decryption key is still published by a recipient.
    pub(crate) fn current(usage: &KeyUsageInfo, detected_at: DateTime<Utc>) -> Self {
        Self { receiver_key: KeyStatus::Current, ..Self::base(usage, detected_at) }
    }

    /// No recipient publishes the decryption key anymore.
    pub(crate) fn retired(
        usage: &KeyUsageInfo,
        detected_at: DateTime<Utc>,
        affected_identities: Vec<String>,
    ) -> Self {
        let reason = format!(
            "decryption key {} is no longer a current key of {}",
            usage.receiver_key_id,
            affected_identities.join(", ")
        );
        Self {
            receiver_key: KeyStatus::Retired,
            affected_identities,
            reason: Some(reason),
            needs_reencryption: true,
            ..Self::base(usage, detected_at)
        }
    }
}

fn sender_status(usage: &KeyUsageInfo) -> KeyStatus {
    if usage.sender_anonymous { KeyStatus::NotApplicable } else { KeyStatus::Unknown }
}
