//! Rekey Cache
//!
//! Persistent identity → public key cache. Records expire by comparing their
//! stored expiry with the current time at read; nothing sweeps in the
//! background. Every mutation is written to disk before it becomes visible.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod config;
mod error;
mod file;

pub use cache::{CacheStats, KeyCache};
pub use config::{CacheConfig, DEFAULT_CACHE_FILE, DEFAULT_TTL};
pub use error::CacheError;
