//! # certverify-crypto
//!
//! Keyed hashing for certverify document registration and lookup.
//!
//! A registered original is identified by the HMAC-SHA512 of its raw bytes
//! under the issuing institute's secret:
//!
//! ```text
//! digest = hex(HMAC-SHA512(institute_secret, document_bytes))
//! ```
//!
//! Digests are compared in constant time.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod keyed;
mod types;

pub use error::CryptoError;
pub use keyed::{keyed_digest_hex, KeyedHasher};
pub use types::{DigestAlgorithm, DocumentDigest};

/// Constant-time byte comparison.
///
/// Compares two byte slices in constant time to prevent timing attacks.
/// Returns `true` if the slices are equal, `false` otherwise.
///
/// Uses the `subtle` crate's `ConstantTimeEq` trait for the comparison.
/// The length check still returns early, but length is typically not secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Compare two hex digests in constant time.
#[must_use]
pub fn digests_match(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}
