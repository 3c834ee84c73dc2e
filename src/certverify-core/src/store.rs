//! Document store.
//!
//! Records live in memory behind a single `RwLock`; every mutation happens
//! under the write lock, so a lookup always sees whole records. With a data
//! directory configured, the full record set is rewritten to
//! `documents.json` (temp file + rename) before the lock is released. A
//! mutation whose write fails is rolled back, so memory never runs ahead
//! of disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::VerifyError;
use crate::hash::short;
use crate::types::{generate_id, now_unix, DocumentRecord};

/// File name of the persisted record set.
pub const DOCUMENTS_FILE: &str = "documents.json";

/// Storage contract consumed by the verification engine.
pub trait DocumentStore: Send + Sync {
    /// Insert a record, assigning its identifier. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::DuplicateHash`] if the record is an issued
    /// original whose hash is already registered to another original.
    fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, VerifyError>;

    /// Records with exactly this hash, in insertion order.
    fn find_by_hash(&self, hash: &str) -> Result<Vec<DocumentRecord>, VerifyError>;

    /// Record by identifier.
    fn get(&self, id: &str) -> Result<Option<DocumentRecord>, VerifyError>;

    /// Add a verifier to the record's set and overwrite its suspicion score
    /// (clamped to `[0, 1]`) in one persisted step. Returns `true` if the
    /// verifier was newly added.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotFound`] for an unknown record. On any error
    /// the stored record is left unchanged.
    fn record_reverification(
        &self,
        id: &str,
        verifier_id: &str,
        score: f64,
    ) -> Result<bool, VerifyError>;

    /// Records examined by a verifier, in insertion order.
    fn list_by_verifier(&self, verifier_id: &str) -> Result<Vec<DocumentRecord>, VerifyError>;

    /// Records owned by an issuer, in insertion order.
    fn list_by_issuer(&self, issuer_id: &str) -> Result<Vec<DocumentRecord>, VerifyError>;
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<String, DocumentRecord>,
    /// Insertion order of record ids.
    order: Vec<String>,
}

impl StoreState {
    fn ordered(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}

/// In-memory store with optional JSON persistence.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        }
    }

    /// Store persisted under `data_dir`, loading any existing records.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::StoreError`] if an existing file cannot be parsed.
    pub fn open(data_dir: &Path) -> Result<Self, VerifyError> {
        let path = data_dir.join(DOCUMENTS_FILE);
        let records: Vec<DocumentRecord> = load_json(&path)?.unwrap_or_default();

        let mut state = StoreState::default();
        for record in records {
            state.order.push(record.id.clone());
            state.records.insert(record.id.clone(), record);
        }
        info!(
            path = %path.display(),
            records = state.order.len(),
            "Store: opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.order.len()).unwrap_or(0)
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, state: &StoreState) -> Result<(), VerifyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let records: Vec<&DocumentRecord> = state.ordered().collect();
        write_json_atomic(path, &records)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>, VerifyError> {
        self.state
            .read()
            .map_err(|_| VerifyError::store("document store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>, VerifyError> {
        self.state
            .write()
            .map_err(|_| VerifyError::store("document store lock poisoned"))
    }

    fn filtered(
        &self,
        pred: impl Fn(&DocumentRecord) -> bool,
    ) -> Result<Vec<DocumentRecord>, VerifyError> {
        let state = self.read()?;
        Ok(state.ordered().filter(|r| pred(r)).cloned().collect())
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, mut record: DocumentRecord) -> Result<DocumentRecord, VerifyError> {
        let mut state = self.write()?;

        if record.is_issued() {
            if let Some(hash) = record.hash.as_deref() {
                let existing = state.ordered().find(|r| {
                    r.is_issued()
                        && r.hash
                            .as_deref()
                            .is_some_and(|h| certverify_crypto::digests_match(h, hash))
                });
                if let Some(existing) = existing {
                    warn!(
                        hash_prefix = %short(hash),
                        existing_id = %existing.id,
                        "Store: duplicate issued hash rejected"
                    );
                    return Err(VerifyError::DuplicateHash {
                        existing_id: existing.id.clone(),
                    });
                }
            }
        }

        record.id = generate_id("doc");
        state.order.push(record.id.clone());
        state.records.insert(record.id.clone(), record.clone());

        if let Err(e) = self.persist(&state) {
            state.records.remove(&record.id);
            state.order.pop();
            return Err(e);
        }

        debug!(id = %record.id, origin = ?record.origin, "Store: inserted");
        Ok(record)
    }

    fn find_by_hash(&self, hash: &str) -> Result<Vec<DocumentRecord>, VerifyError> {
        self.filtered(|r| {
            r.hash
                .as_deref()
                .is_some_and(|h| certverify_crypto::digests_match(h, hash))
        })
    }

    fn get(&self, id: &str) -> Result<Option<DocumentRecord>, VerifyError> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn record_reverification(
        &self,
        id: &str,
        verifier_id: &str,
        score: f64,
    ) -> Result<bool, VerifyError> {
        let mut state = self.write()?;
        let mut staged = state
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| VerifyError::not_found("document", id))?;

        let added = staged.add_verifier(verifier_id);
        staged.suspicion_score = score.clamp(0.0, 1.0);
        staged.updated_at = now_unix();

        let previous = state.records.insert(id.to_string(), staged);
        if let Err(e) = self.persist(&state) {
            if let Some(previous) = previous {
                state.records.insert(id.to_string(), previous);
            }
            warn!(id = %id, error = %e, "Store: reverification not persisted, rolled back");
            return Err(e);
        }
        debug!(id = %id, verifier_added = added, "Store: reverification recorded");
        Ok(added)
    }

    fn list_by_verifier(&self, verifier_id: &str) -> Result<Vec<DocumentRecord>, VerifyError> {
        self.filtered(|r| r.verified_by.iter().any(|v| v == verifier_id))
    }

    fn list_by_issuer(&self, issuer_id: &str) -> Result<Vec<DocumentRecord>, VerifyError> {
        self.filtered(|r| r.issuer_ref.as_deref() == Some(issuer_id))
    }
}

/// Read a JSON file. `Ok(None)` if it does not exist.
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, VerifyError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Store: no existing file");
            return Ok(None);
        },
        Err(e) => {
            return Err(VerifyError::store(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        },
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| VerifyError::store(format!("failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a sibling temp file, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), VerifyError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VerifyError::store(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| VerifyError::store(format!("failed to serialize: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)
        .map_err(|e| VerifyError::store(format!("failed to write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        VerifyError::store(format!("failed to replace {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DocumentStatus, OcrData, RecordOrigin, VerificationState, Verdict,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn record(origin: RecordOrigin, hash: Option<&str>, issuer: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            id: String::new(),
            hash: hash.map(str::to_string),
            suspicion_score: 0.0,
            verdict: Verdict::Authentic,
            status: DocumentStatus::Verified,
            origin,
            verification_state: VerificationState::HashVerified,
            issuer_ref: issuer.map(str::to_string),
            verified_by: vec!["ver-1".into()],
            source: "/tmp/cert.png".into(),
            ocr: OcrData::default(),
            explanation: vec![],
            metadata: BTreeMap::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_insert_assigns_id_and_get() {
        let store = MemoryStore::new();
        let stored = store
            .insert(record(RecordOrigin::Issued, Some("aa"), Some("iss-1")))
            .unwrap();
        assert!(stored.id.starts_with("doc-"));
        assert_eq!(store.get(&stored.id).unwrap(), Some(stored));
        assert!(store.get("doc-missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_issued_hash_rejected() {
        let store = MemoryStore::new();
        let first = store
            .insert(record(RecordOrigin::Issued, Some("abcd"), Some("iss-1")))
            .unwrap();
        let err = store
            .insert(record(RecordOrigin::Issued, Some("abcd"), Some("iss-2")))
            .unwrap_err();
        match err {
            VerifyError::DuplicateHash { existing_id } => assert_eq!(existing_id, first.id),
            other => panic!("unexpected error: {other}"),
        }

        // Verifier uploads of the same content are allowed.
        store
            .insert(record(RecordOrigin::VerifierUpload, Some("abcd"), None))
            .unwrap();
        assert_eq!(store.find_by_hash("abcd").unwrap().len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_find_by_hash_insertion_order() {
        let store = MemoryStore::new();
        let a = store
            .insert(record(RecordOrigin::VerifierUpload, Some("ff"), None))
            .unwrap();
        let b = store
            .insert(record(RecordOrigin::Issued, Some("ff"), Some("iss-1")))
            .unwrap();
        store
            .insert(record(RecordOrigin::VerifierUpload, None, None))
            .unwrap();

        let found: Vec<String> = store
            .find_by_hash("ff")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(found, vec![a.id, b.id]);
        assert!(store.find_by_hash("00").unwrap().is_empty());
    }

    #[test]
    fn test_record_reverification() {
        let store = MemoryStore::new();
        let rec = store
            .insert(record(RecordOrigin::VerifierUpload, None, None))
            .unwrap();

        assert!(!store.record_reverification(&rec.id, "ver-1", 0.4).unwrap());
        assert!(store.record_reverification(&rec.id, "ver-2", 1.7).unwrap());
        assert_eq!(store.list_by_verifier("ver-2").unwrap().len(), 1);

        let updated = store.get(&rec.id).unwrap().unwrap();
        assert!((updated.suspicion_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(updated.verified_by, vec!["ver-1", "ver-2"]);

        let err = store
            .record_reverification("doc-missing", "ver-1", 0.1)
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotFound { kind: "document", .. }));
    }

    #[test]
    fn test_failed_write_leaves_record_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let mut seed = record(RecordOrigin::VerifierUpload, None, None);
        seed.suspicion_score = 0.8;
        let rec = store.insert(seed).unwrap();

        // A directory in the temp file's place makes every write fail.
        let blocker = dir.path().join("documents.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let err = store.record_reverification(&rec.id, "ver-2", 0.1).unwrap_err();
        assert!(matches!(err, VerifyError::StoreError { .. }));
        let err = store.record_reverification(&rec.id, "ver-2", 0.1).unwrap_err();
        assert!(matches!(err, VerifyError::StoreError { .. }));

        let in_memory = store.get(&rec.id).unwrap().unwrap();
        assert_eq!(in_memory.verified_by, vec!["ver-1"]);
        assert!((in_memory.suspicion_score - 0.8).abs() < f64::EPSILON);

        let err = store
            .insert(record(RecordOrigin::VerifierUpload, None, None))
            .unwrap_err();
        assert!(matches!(err, VerifyError::StoreError { .. }));
        assert_eq!(store.len(), 1);

        // Once writes succeed again the retry is applied and saved.
        std::fs::remove_dir(&blocker).unwrap();
        assert!(store.record_reverification(&rec.id, "ver-2", 0.1).unwrap());

        let reopened = MemoryStore::open(dir.path()).unwrap();
        let on_disk = reopened.get(&rec.id).unwrap().unwrap();
        assert_eq!(on_disk.verified_by, vec!["ver-1", "ver-2"]);
        assert!((on_disk.suspicion_score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_list_by_issuer() {
        let store = MemoryStore::new();
        store
            .insert(record(RecordOrigin::Issued, Some("01"), Some("iss-1")))
            .unwrap();
        store
            .insert(record(RecordOrigin::Issued, Some("02"), Some("iss-2")))
            .unwrap();
        assert_eq!(store.list_by_issuer("iss-1").unwrap().len(), 1);
        assert!(store.list_by_issuer("iss-3").unwrap().is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = MemoryStore::open(dir.path()).unwrap();
            let rec = store
                .insert(record(RecordOrigin::Issued, Some("beef"), Some("iss-1")))
                .unwrap();
            store.record_reverification(&rec.id, "ver-9", 0.2).unwrap();
            rec.id
        };

        let reopened = MemoryStore::open(dir.path()).unwrap();
        let rec = reopened.get(&id).unwrap().unwrap();
        assert_eq!(rec.verified_by, vec!["ver-1", "ver-9"]);
        assert_eq!(reopened.find_by_hash("beef").unwrap().len(), 1);
        assert!(!dir.path().join("documents.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DOCUMENTS_FILE), b"{not json").unwrap();
        let err = MemoryStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, VerifyError::StoreError { .. }));
    }

    #[test]
    fn test_concurrent_inserts_single_issued_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.insert(record(
                        RecordOrigin::Issued,
                        Some("cafe"),
                        Some(&format!("iss-{i}")),
                    ))
                })
            })
            .collect();

        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(ok, 1);
        assert_eq!(store.find_by_hash("cafe").unwrap().len(), 1);
    }
}
