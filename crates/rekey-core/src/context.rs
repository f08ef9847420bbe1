//! Per-call cancellation and deadline.
//!
//! A [`Context`] travels down a call chain (manager → client → transport) so
//! that every network request and every retry wait aborts promptly when the
//! caller gives up. Cancellation and deadlines are reported separately because
//! the directory client classifies them differently: an expired deadline is
//! temporary, an explicit cancel is not.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a call stopped before completing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal plus optional deadline.
///
/// Cloning shares the same token: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Context with no deadline and a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_after(timeout)
    }

    /// Context driven by an externally owned token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Same token, with the deadline set to `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    #[must_use]
    pub fn deadline_after(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Report whether the context has already been interrupted.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `future` to completion unless the context is interrupted first.
    ///
    /// The future is dropped as soon as the token fires or the deadline
    /// passes; nothing keeps running in the background.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = deadline => Err(Interrupted::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}
