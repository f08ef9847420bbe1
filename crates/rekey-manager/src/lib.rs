//! Rekey Manager
//!
//! Cache-first public key resolution. A [`KeyManager`] answers from its
//! [`KeyCache`](rekey_cache::KeyCache) when it can and falls back to a single
//! batched directory lookup for whatever is missing or expired.
//!
//! # Modes
//!
//! The mode is chosen at construction and never changes:
//!
//! - [`Mode::Online`]: misses are fetched from the directory
//! - [`Mode::Offline`]: misses fail with `NotFound`; refreshes fail with
//!   `Network`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod manager;

pub use config::{ManagerConfig, Mode};
pub use error::ManagerError;
pub use manager::KeyManager;
