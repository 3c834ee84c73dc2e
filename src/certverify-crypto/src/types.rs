//! Digest types shared across certverify.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keyed hash construction used for document digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// HMAC over SHA-512 (512-bit output).
    HmacSha512,
}

impl DigestAlgorithm {
    /// Algorithm name as used in logs and persisted records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HmacSha512 => "hmac-sha512",
        }
    }

    /// Raw output length in bytes.
    #[must_use]
    pub fn output_len(&self) -> usize {
        match self {
            Self::HmacSha512 => 64,
        }
    }

    /// Output length as lowercase hex characters.
    #[must_use]
    pub fn hex_len(&self) -> usize {
        self.output_len() * 2
    }
}

impl Default for DigestAlgorithm {
    fn default() -> Self {
        Self::HmacSha512
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lowercase hex keyed digest of document content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentDigest(String);

impl DocumentDigest {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the hex string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
