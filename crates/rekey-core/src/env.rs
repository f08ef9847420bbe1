//! Environment abstraction for deterministic testing.
//!
//! Decouples key resolution logic from system resources (wall clock, sleeping).
//! Production code uses [`SystemEnv`]; tests substitute a manual clock so TTL
//! expiry and retry backoff can be exercised without waiting.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleep.
///
/// # Invariants
///
/// - `now()` is the wall clock used for cache timestamps. It is compared
///   against persisted expiry times, so it must be calendar time, not a
///   monotonic instant.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// Only retry loops call this. Callers wrap it in
    /// [`Context::run`](crate::Context::run) so the wait stays cancellable.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production environment using the system clock and Tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
