//! Rekey Core
//!
//! Shared vocabulary for resolving recipient identities to their current
//! public keys. Every other `rekey-*` crate builds on the types here.
//!
//! # Components
//!
//! - [`Environment`]: Wall clock and async sleep, swappable for tests
//! - [`Context`]: Cancellation token plus optional deadline for one call chain
//! - [`DirectoryKey`] / [`PublicKeyRecord`]: Key material as fetched and as cached
//! - [`CryptoProvider`]: The external encrypt/decrypt capability this workspace
//!   consumes but never implements

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod context;
pub mod crypto;
pub mod env;
mod identity;
mod record;

pub use context::{Context, Interrupted};
pub use crypto::{CryptoError, CryptoProvider, Decrypted, KeyUsageInfo};
pub use env::{Environment, SystemEnv};
pub use identity::{IdentityError, validate_identity};
pub use record::{DirectoryKey, PublicKeyRecord};
