//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during keyed hashing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The hashing key is missing or unusable.
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Reason the key is invalid.
        reason: String,
    },
}

impl CryptoError {
    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }
}
