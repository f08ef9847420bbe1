//! Boundary to the external encryption capability.
//!
//! The encryption protocol itself lives outside this workspace. Rotation
//! detection only needs two things from it: encrypt to a set of public keys,
//! and decrypt while reporting which recipient key did the work.

use thiserror::Error;

use crate::PublicKeyRecord;

/// Which keys were involved in a successful decryption.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyUsageInfo {
    /// Key id of the recipient key that decrypted the message.
    pub receiver_key_id: String,
    /// Key id of the sender's signing key, if the message was signed.
    pub sender_key_id: Option<String>,
    /// True if the sender chose to stay anonymous.
    pub sender_anonymous: bool,
}

/// Plaintext plus the key usage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Recovered plaintext.
    pub plaintext: Vec<u8>,
    /// Keys that were used.
    pub key_usage: KeyUsageInfo,
}

/// Failures reported by a [`CryptoProvider`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Decryption failed (no usable key, tampering, malformed input).
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Opaque encrypt/decrypt capability.
///
/// Implementations own key format conversion and all cryptography; this
/// workspace only hands them [`PublicKeyRecord`]s and inspects
/// [`KeyUsageInfo`].
pub trait CryptoProvider: Send + Sync {
    /// Encrypt `plaintext` so every key in `recipients` can decrypt it.
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[PublicKeyRecord],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt `ciphertext` with whatever local key matches.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Decrypted, CryptoError>;
}
