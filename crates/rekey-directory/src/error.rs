//! Classified directory errors.
//!
//! Each failure carries an explicit [`ErrorKind`] set at the point of failure.
//! The retry loop and callers branch on the kind, never on the concrete type
//! of an underlying cause.

use std::{error::Error as StdError, fmt, sync::Arc, time::Duration};

use rekey_core::{IdentityError, Interrupted};

/// Failure taxonomy for directory lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection, DNS or other transport failure before any response.
    Network,
    /// Deadline expired or the call was cancelled.
    Timeout,
    /// HTTP 429.
    RateLimit,
    /// HTTP 404, or requested identities missing from the response.
    NotFound,
    /// HTTP 400/401/403, or an identity failed validation.
    InvalidInput,
    /// HTTP 5xx.
    ServerError,
    /// Malformed body, or a matched identity without key material.
    InvalidResponse,
    /// Anything else, including unrecognized embedded status codes.
    Unknown,
}

impl ErrorKind {
    /// True for kinds the retry loop attempts again.
    pub fn is_retryable(self) -> bool {
        match self {
            Self::Network | Self::Timeout | Self::ServerError | Self::RateLimit => true,
            Self::NotFound | Self::InvalidInput | Self::InvalidResponse | Self::Unknown => false,
        }
    }

    /// Stable lower-case name used in messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate limit",
            Self::NotFound => "not found",
            Self::InvalidInput => "invalid input",
            Self::ServerError => "server error",
            Self::InvalidResponse => "invalid response",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified lookup failure. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct DirectoryError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    temporary: bool,
    retry_after: Option<Duration>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl DirectoryError {
    fn new(kind: ErrorKind, message: impl Into<String>, temporary: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            temporary,
            retry_after: None,
            source: None,
        }
    }

    /// Transport failure before any response arrived.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message, true)
    }

    /// Deadline expired.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, true)
    }

    /// Caller cancelled explicitly. Classified as a timeout but not temporary.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, false)
    }

    /// HTTP 429 with the server's suggested wait, if it gave one.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let mut err = Self::new(ErrorKind::RateLimit, message, true).with_status(429);
        err.retry_after = retry_after;
        err
    }

    /// Requested identities were not found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message, false)
    }

    /// Caller input was rejected.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message, false)
    }

    /// Server-side failure.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message, true)
    }

    /// The response could not be used.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message, false)
    }

    /// Unclassified failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message, false)
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let detail = body_excerpt(body);
        let err = match status {
            429 => {
                return Self::rate_limited(format!("rate limited (HTTP 429){detail}"), retry_after);
            },
            404 => Self::not_found(format!("directory returned HTTP 404{detail}")),
            400 | 401 | 403 => {
                Self::invalid_input(format!("request rejected with HTTP {status}{detail}"))
            },
            500..=599 => Self::server_error(format!("directory returned HTTP {status}{detail}")),
            _ => Self::unknown(format!("unexpected HTTP status {status}{detail}")),
        };
        err.with_status(status)
    }

    /// Attach the transport status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Transport status code, when a response was received.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// True if the same request may succeed later.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Server-suggested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl StdError for DirectoryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn StdError + 'static))
    }
}

impl From<Interrupted> for DirectoryError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::cancelled("lookup cancelled"),
            Interrupted::DeadlineExceeded => Self::deadline_exceeded("lookup deadline exceeded"),
        }
        .with_source(interrupted)
    }
}

impl From<IdentityError> for DirectoryError {
    fn from(err: IdentityError) -> Self {
        Self::invalid_input(err.to_string()).with_source(err)
    }
}

/// Short, single-line excerpt of a response body for error messages.
fn body_excerpt(body: &str) -> String {
    const MAX: usize = 200;

    let line = body.trim().lines().next().unwrap_or_default();
    if line.is_empty() {
        return String::new();
    }
    let excerpt: String = line.chars().take(MAX).collect();
    format!(": {excerpt}")
}
