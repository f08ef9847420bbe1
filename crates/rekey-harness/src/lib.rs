//! Deterministic test doubles for the rekey crates.
//!
//! # Components
//!
//! - [`ManualEnv`]: Settable wall clock; sleeps return immediately and are recorded
//! - [`ScriptedTransport`]: Replays a fixed sequence of responses
//! - [`FakeDirectory`]: In-memory directory that answers lookups from a user table
//! - [`FakeCrypto`]: Transparent envelope "encryption" that reports key usage

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod directory;
mod env;
mod transport;

pub use crypto::{Envelope, FakeCrypto};
pub use directory::FakeDirectory;
pub use env::ManualEnv;
pub use transport::{ScriptedTransport, lookup_body};
