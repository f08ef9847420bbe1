//! Cache errors.
//!
//! All of these are hard failures: the cache never retries I/O.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors from loading or persisting the cache file.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The containing directory could not be created.
    #[error("failed to create cache directory {}: {source}", path.display())]
    CreateDir {
        /// Directory being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An existing cache file could not be read.
    #[error("failed to read cache file {}: {source}", path.display())]
    Read {
        /// Cache file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An existing cache file is not valid cache JSON.
    #[error("malformed cache file {}: {source}", path.display())]
    Parse {
        /// Cache file.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory state could not be serialized.
    #[error("failed to serialize cache for {}: {source}", path.display())]
    Serialize {
        /// Cache file.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing the temporary file failed.
    #[error("failed to write cache file {}: {source}", path.display())]
    Write {
        /// Cache file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Replacing the cache file with the temporary file failed.
    #[error("failed to replace cache file {}: {source}", path.display())]
    Persist {
        /// Cache file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
