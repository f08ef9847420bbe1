//! Rekey Rotation
//!
//! Detects when stored ciphertext was encrypted to a key its recipients no
//! longer publish, and re-encrypts it lazily when it is next read.
//!
//! # Flow per item
//!
//! ```text
//! decrypt → detect rotation → re-encrypt if needed → MigrationResult
//! ```
//!
//! Detection is advisory. If current keys cannot be fetched the item still
//! decrypts and its [`RotationInfo`] reports [`KeyStatus::Unknown`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod detector;
mod error;
mod migration;
mod status;

pub use detector::RotationDetector;
pub use error::MigrationError;
pub use migration::{
    DecryptOutcome, LazyReEncryptor, MigrationConfig, MigrationResult, MigrationSummary,
    ReEncryptRequest, ReEncryption,
};
pub use status::{KeyStatus, RotationInfo};
