//! Manual clock environment.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use rekey_core::Environment;

/// Environment with a clock that only moves when told to.
///
/// `sleep` returns immediately, records the requested duration and advances
/// the clock by it, so backoff schedules can be asserted exactly. Clones share
/// the same clock and sleep log.
#[derive(Clone)]
pub struct ManualEnv {
    now: Arc<Mutex<DateTime<Utc>>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Default for ManualEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualEnv {
    /// Clock starting at 2026-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    /// Clock starting at `start`.
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)), sleeps: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Move the clock forward, saturating at the maximum timestamp.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = TimeDelta::from_std(by)
            .ok()
            .and_then(|by| now.checked_add_signed(by))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Environment for ManualEnv {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.sleeps.lock().push(duration);
        self.advance(duration);
        std::future::ready(())
    }
}
