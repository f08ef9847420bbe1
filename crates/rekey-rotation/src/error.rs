//! Migration errors.

use rekey_core::CryptoError;
use rekey_manager::ManagerError;
use thiserror::Error;

/// Failure processing one item.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The stored ciphertext could not be decrypted.
    #[error(transparent)]
    Decrypt(CryptoError),

    /// Encrypting to the current keys failed.
    #[error(transparent)]
    Encrypt(CryptoError),

    /// Current recipient keys could not be resolved.
    #[error("recipient key lookup failed: {0}")]
    KeyLookup(#[source] ManagerError),

    /// Neither the request nor the configuration named any recipient.
    #[error("no recipients to encrypt to")]
    NoRecipients,
}
