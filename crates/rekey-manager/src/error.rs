//! Manager errors.

use rekey_cache::CacheError;
use rekey_directory::{DirectoryError, ErrorKind};
use thiserror::Error;

/// Failure resolving keys.
///
/// Directory classification passes through untouched so callers can branch
/// on [`kind`](Self::kind).
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Lookup failed, or an identity could not be resolved.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Cache I/O failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ManagerError {
    /// Directory classification, if this is a lookup failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Directory(err) => Some(err.kind()),
            Self::Cache(_) => None,
        }
    }

    /// True when one or more identities could not be resolved.
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}
