//! Directory Client
//!
//! Resolves identities to their published public keys with one batched
//! request per call, retrying transient failures with exponential backoff.
//!
//! # Architecture
//!
//! [`DirectoryClient`] owns the retry loop and response reconciliation. The
//! actual HTTP exchange sits behind the [`Transport`] trait so the loop can
//! be driven by scripted responses in tests; [`ReqwestTransport`] is the
//! production implementation.
//!
//! # Errors
//!
//! Every failure is a [`DirectoryError`] tagged with an [`ErrorKind`]. Only
//! [`ErrorKind::is_retryable`] kinds are retried, and retries happen here and
//! nowhere above.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod retry_after;
mod transport;
pub mod wire;

pub use client::DirectoryClient;
pub use config::{
    ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
    LOOKUP_FIELDS, LOOKUP_PATH, USER_AGENT,
};
pub use error::{DirectoryError, ErrorKind};
pub use retry_after::parse_retry_after;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
