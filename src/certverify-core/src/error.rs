//! Error types for verification operations.

use thiserror::Error;

/// Errors that can occur during verification.
///
/// Only [`VerifyError::SourceUnavailable`] aborts the verification
/// pipeline. Every analyzer failure degrades to a fallback score instead
/// and never surfaces as a `VerifyError`.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Document content could not be read (filesystem or network).
    #[error("Source unavailable: {reference}: {message}")]
    SourceUnavailable {
        /// Path or URL that was requested.
        reference: String,
        /// Error message.
        message: String,
    },

    /// Keyed hash could not be computed (key or content issue).
    #[error("Hash computation failed: {reason}")]
    HashComputation {
        /// Reason for failure.
        reason: String,
    },

    /// Upload rejected before any processing.
    #[error("Invalid upload: {reason}")]
    InvalidUpload {
        /// Reason the upload was rejected.
        reason: String,
    },

    /// Identity registration rejected.
    #[error("Invalid identity: {reason}")]
    InvalidIdentity {
        /// Reason the identity was rejected.
        reason: String,
    },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind (document, issuer, verifier, institute).
        kind: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// An issued original with this hash is already registered.
    #[error("Hash already registered to document {existing_id}")]
    DuplicateHash {
        /// Document that owns the hash.
        existing_id: String,
    },

    /// Document store failure.
    #[error("Store error: {message}")]
    StoreError {
        /// Error message.
        message: String,
    },

    /// Text extraction failure.
    #[error("OCR error: {message}")]
    OcrError {
        /// Error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },
}

impl VerifyError {
    /// Check if this error aborts the verification pipeline.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }

    /// Check if this error degrades hashing to the unavailable path.
    #[must_use]
    pub fn is_hash_degradation(&self) -> bool {
        matches!(self, Self::HashComputation { .. })
    }

    /// Check if this error is caused by caller input rather than the system.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUpload { .. }
                | Self::InvalidIdentity { .. }
                | Self::NotFound { .. }
                | Self::DuplicateHash { .. }
        )
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid_identity(reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_upload(reason: impl Into<String>) -> Self {
        Self::InvalidUpload {
            reason: reason.into(),
        }
    }
}
