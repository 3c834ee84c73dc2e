//! HMAC-SHA512 keyed hashing of document content.
//!
//! The digest binds content to the issuing institute's secret: the same
//! bytes hashed under two institutes' keys produce unrelated digests.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::CryptoError;
use crate::types::{DigestAlgorithm, DocumentDigest};

type HmacSha512 = Hmac<Sha512>;

/// Keyed hasher bound to one secret.
///
/// The key bytes are held for the hasher's lifetime and never exposed.
pub struct KeyedHasher {
    key: Vec<u8>,
}

impl KeyedHasher {
    /// Create a hasher for a secret key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the key is empty.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::invalid_key("key is empty"));
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Create a hasher from a string secret (UTF-8 bytes).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the secret is empty.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        Self::new(secret.as_bytes())
    }

    /// The algorithm this hasher produces.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        DigestAlgorithm::HmacSha512
    }

    /// Compute the keyed digest of `content`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the MAC rejects the key.
    pub fn digest(&self, content: &[u8]) -> Result<DocumentDigest, CryptoError> {
        let mac = self.mac(content)?;
        Ok(DocumentDigest::from_bytes(&mac.finalize().into_bytes()))
    }

    fn mac(&self, content: &[u8]) -> Result<HmacSha512, CryptoError> {
        let mut mac = <HmacSha512 as Mac>::new_from_slice(&self.key)
            .map_err(|e| CryptoError::invalid_key(e.to_string()))?;
        mac.update(content);
        Ok(mac)
    }
}

impl std::fmt::Debug for KeyedHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedHasher")
            .field("algorithm", &self.algorithm())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// One-shot keyed digest as lowercase hex.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if the key is empty.
pub fn keyed_digest_hex(key: &[u8], content: &[u8]) -> Result<String, CryptoError> {
    Ok(KeyedHasher::new(key)?.digest(content)?.into_string())
}
