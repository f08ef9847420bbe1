//! Lookup response wire format.
//!
//! ```text
//! {
//!   "status": { "code": 0, "name": "OK" },
//!   "them": [
//!     { "basics": { "username": "alice" },
//!       "public_keys": { "primary": { "kid": "0120…", "bundle": "-----BEGIN…" } } },
//!     null
//!   ]
//! }
//! ```
//!
//! The directory reports an unknown name as a `null` slot in `them`, so every
//! level below `them` is optional here and validated by the client.

use serde::{Deserialize, Serialize};

/// Embedded status code for success.
pub const STATUS_OK: i64 = 0;

/// Embedded status code for rejected input.
pub const STATUS_INPUT_ERROR: i64 = 100;

/// Embedded status code for unknown names.
pub const STATUS_NOT_FOUND: i64 = 205;

/// Top-level lookup response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Embedded application status.
    pub status: ApiStatus,
    /// One slot per user the directory chose to report.
    #[serde(default)]
    pub them: Vec<Option<UserEntry>>,
}

/// Embedded application status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    /// Numeric status; zero means success.
    pub code: i64,
    /// Symbolic status name.
    #[serde(default)]
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// One user in the response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserEntry {
    /// Basic profile fields.
    #[serde(default)]
    pub basics: Option<Basics>,
    /// Published keys.
    #[serde(default)]
    pub public_keys: Option<PublicKeys>,
}

/// Basic profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basics {
    /// Canonical username.
    pub username: String,
}

/// Published keys for a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublicKeys {
    /// The user's current primary key.
    #[serde(default)]
    pub primary: Option<PrimaryKey>,
}

/// Primary key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Key id.
    pub kid: String,
    /// Armored public key bundle.
    pub bundle: String,
}

impl UserEntry {
    /// Username, if the entry carries one.
    pub fn username(&self) -> Option<&str> {
        self.basics.as_ref().map(|basics| basics.username.as_str())
    }

    /// Primary key, if present with a non-empty kid and bundle.
    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.public_keys
            .as_ref()
            .and_then(|keys| keys.primary.as_ref())
            .filter(|key| !key.kid.is_empty() && !key.bundle.is_empty())
    }
}
