//! Hash lookup against registered originals.

use tracing::{debug, info};

use crate::error::VerifyError;
use crate::hash::short;
use crate::store::DocumentStore;
use crate::types::{DocumentRecord, VerificationState};

/// Outcome of resolving a document hash.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverState {
    /// An issued original has this hash.
    Matched(Box<DocumentRecord>),
    /// Hash computed, no original has it.
    NotFound,
    /// Hashing failed upstream.
    HashUnavailable,
}

impl ResolverState {
    /// Branch name recorded on the verification.
    #[must_use]
    pub fn verification_state(&self) -> VerificationState {
        match self {
            Self::Matched(_) => VerificationState::HashVerified,
            Self::NotFound => VerificationState::HashNotFound,
            Self::HashUnavailable => VerificationState::HashUnavailable,
        }
    }

    /// Issuer of the matched original.
    #[must_use]
    pub fn existing_issuer(&self) -> Option<&str> {
        match self {
            Self::Matched(record) => record.issuer_ref.as_deref(),
            Self::NotFound | Self::HashUnavailable => None,
        }
    }
}

/// Resolves hashes against the document store.
///
/// Only issued originals are authoritative. Verifier uploads carry hashes
/// too, but matching one would let any earlier upload vouch for itself.
pub struct AuthenticityResolver<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AuthenticityResolver<'a> {
    /// Resolver over `store`.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve `hash`; `None` means hashing failed.
    ///
    /// When several originals share a hash, the earliest inserted wins.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::StoreError`] if the store cannot be read.
    pub fn resolve(&self, hash: Option<&str>) -> Result<ResolverState, VerifyError> {
        let Some(hash) = hash else {
            debug!("Resolver: no hash, skipping lookup");
            return Ok(ResolverState::HashUnavailable);
        };

        let matched = self
            .store
            .find_by_hash(hash)?
            .into_iter()
            .find(DocumentRecord::is_issued);

        Ok(match matched {
            Some(record) => {
                info!(
                    hash_prefix = %short(hash),
                    document_id = %record.id,
                    issuer = ?record.issuer_ref,
                    "Resolver: hash matches registered original"
                );
                ResolverState::Matched(Box::new(record))
            },
            None => {
                info!(hash_prefix = %short(hash), "Resolver: hash not registered");
                ResolverState::NotFound
            },
        })
    }
}
