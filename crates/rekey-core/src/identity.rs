//! Identity validation.

use thiserror::Error;

/// Reasons an identity string is rejected before any lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Identity was the empty string.
    #[error("identity must not be empty")]
    Empty,

    /// Identity contains a character outside `[A-Za-z0-9_]`.
    #[error("invalid identity {identity:?}: only letters, digits and underscore are allowed")]
    InvalidCharacter {
        /// The rejected identity.
        identity: String,
    },
}

/// Check that `identity` is non-empty and uses only ASCII letters, digits and
/// underscore.
pub fn validate_identity(identity: &str) -> Result<(), IdentityError> {
    if identity.is_empty() {
        return Err(IdentityError::Empty);
    }
    if !identity.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(IdentityError::InvalidCharacter { identity: identity.to_string() });
    }
    Ok(())
}
