//! Keyed document hashing.

use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::source::ContentSource;

/// Fetched document bytes with their keyed digest.
#[derive(Debug)]
pub struct HashedContent {
    /// Raw bytes as read from the source.
    pub content: Vec<u8>,
    /// Hex digest, or why it could not be computed.
    pub digest: Result<String, VerifyError>,
}

/// Computes the keyed HMAC-SHA512 digest of document content.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashComputer;

impl HashComputer {
    /// Create a hash computer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lowercase hex digest of `content` keyed with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::HashComputation`] if the key is unusable.
    pub fn compute(&self, content: &[u8], secret: &str) -> Result<String, VerifyError> {
        let digest = certverify_crypto::keyed_digest_hex(secret.as_bytes(), content).map_err(
            |e| {
                warn!(error = %e, len = content.len(), "Hash: computation failed");
                VerifyError::HashComputation {
                    reason: e.to_string(),
                }
            },
        )?;
        debug!(hash_prefix = %short(&digest), len = content.len(), "Hash: computed");
        Ok(digest)
    }

    /// Fetch `reference` and hash it with `secret`.
    ///
    /// A missing or unusable secret only fails the digest, so the caller can
    /// still analyze the content.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SourceUnavailable`] if fetching fails.
    pub async fn compute_from_source(
        &self,
        reference: &str,
        secret: Option<&str>,
        source: &dyn ContentSource,
    ) -> Result<HashedContent, VerifyError> {
        let content = source.fetch(reference).await?;
        let digest = match secret {
            Some(secret) => self.compute(&content, secret),
            None => Err(VerifyError::HashComputation {
                reason: "no secret key available".to_string(),
            }),
        };
        Ok(HashedContent { content, digest })
    }
}

/// First 16 hex characters, for logs.
pub(crate) fn short(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}
