//! Record, request and report types for certificate verification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::quality::QualityAnalysis;
use crate::text::TextAnalysis;

/// Score below which a document is likely authentic.
pub const LIKELY_AUTHENTIC_BELOW: f64 = 0.3;
/// Score at or above which a document is highly suspicious.
pub const HIGHLY_SUSPICIOUS_FROM: f64 = 0.7;

/// Categorical bucket for a suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Combined score below 0.3.
    LikelyAuthentic,
    /// Combined score in `[0.3, 0.7)`.
    RequiresReview,
    /// Combined score 0.7 or above.
    HighlySuspicious,
    /// Hash matched a registered original.
    Authentic,
    /// Scoring failed.
    Error,
}

impl Verdict {
    /// Threshold verdict for a combined score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < LIKELY_AUTHENTIC_BELOW {
            Self::LikelyAuthentic
        } else if score < HIGHLY_SUSPICIOUS_FROM {
            Self::RequiresReview
        } else {
            Self::HighlySuspicious
        }
    }

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LikelyAuthentic => "likely_authentic",
            Self::RequiresReview => "requires_review",
            Self::HighlySuspicious => "highly_suspicious",
            Self::Authentic => "authentic",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted lifecycle state of a document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Hash matched, or registered by its issuer.
    Verified,
    /// Needs a human look.
    PendingReview,
    /// Flagged by the heuristics or an unknown hash.
    Suspicious,
    /// Not yet processed.
    Pending,
}

impl DocumentStatus {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::PendingReview => "pending_review",
            Self::Suspicious => "suspicious",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Registered by its issuer; authoritative for hash lookups.
    Issued,
    /// Uploaded by a verifier for checking.
    VerifierUpload,
}

/// Which branch of the hash lookup a verification took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// Hash matched a registered original.
    HashVerified,
    /// Hash computed but unknown.
    HashNotFound,
    /// Hash could not be computed.
    HashUnavailable,
}

impl VerificationState {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HashVerified => "hash_verified",
            Self::HashNotFound => "hash_not_found",
            Self::HashUnavailable => "hash_unavailable",
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted text carried with a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrData {
    /// Full extracted text.
    pub extracted_text: String,
    /// Character count of `extracted_text`.
    pub text_length: usize,
    /// Extractor that produced the text.
    pub extraction_method: String,
}

impl OcrData {
    /// Wrap extracted text.
    #[must_use]
    pub fn new(text: String, method: impl Into<String>) -> Self {
        Self {
            text_length: text.chars().count(),
            extracted_text: text,
            extraction_method: method.into(),
        }
    }
}

/// One verification subject.
///
/// Created once per upload. Afterwards only `verified_by` grows and
/// `suspicion_score` may be overwritten by a re-verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Keyed hash of the content, if it could be computed.
    pub hash: Option<String>,
    /// Suspicion score in `[0, 1]`.
    pub suspicion_score: f64,
    /// Verdict at creation time.
    pub verdict: Verdict,
    /// Lifecycle status.
    pub status: DocumentStatus,
    /// How the record was created.
    pub origin: RecordOrigin,
    /// Lookup branch taken when created.
    pub verification_state: VerificationState,
    /// Issuer that owns the original, if known.
    pub issuer_ref: Option<String>,
    /// Identities that examined the record. No duplicates.
    pub verified_by: Vec<String>,
    /// Path or URL the content was read from.
    pub source: String,
    /// Extracted text.
    pub ocr: OcrData,
    /// Explanation recorded at creation.
    pub explanation: Vec<String>,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Creation time (Unix seconds).
    pub created_at: i64,
    /// Last modification time (Unix seconds).
    pub updated_at: i64,
}

impl DocumentRecord {
    /// Add a verifier unless already present. Returns `true` if added.
    pub fn add_verifier(&mut self, verifier_id: &str) -> bool {
        if self.verified_by.iter().any(|v| v == verifier_id) {
            return false;
        }
        self.verified_by.push(verifier_id.to_string());
        true
    }

    /// Check whether this record is an authoritative original.
    #[must_use]
    pub fn is_issued(&self) -> bool {
        self.origin == RecordOrigin::Issued
    }

    /// Original file name from metadata.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.metadata
            .get("original_filename")
            .map_or("Unknown", String::as_str)
    }
}

/// A verifier submitting a document for checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Verifier identity.
    pub verifier_id: String,
    /// Path or URL of the document.
    pub source: String,
    /// File name used for type validation.
    pub filename: String,
    /// Institute whose secret keys the hash (fallback secret if `None`).
    #[serde(default)]
    pub institute_id: Option<String>,
    /// Free-form document type label.
    #[serde(default)]
    pub document_type: Option<String>,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// An issuer registering an original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Issuer identity.
    pub issuer_id: String,
    /// Path or URL of the original.
    pub source: String,
    /// File name used for type validation.
    pub filename: String,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Output of a verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Identifier of the persisted record.
    pub document_id: String,
    /// Keyed hash, if computed.
    pub hash: Option<String>,
    /// Final suspicion score.
    pub suspicion_score: f64,
    /// Final verdict.
    pub verdict: Verdict,
    /// Final status.
    pub status: DocumentStatus,
    /// Lookup branch taken.
    pub verification_state: VerificationState,
    /// Ordered explanation phrases.
    pub explanation: Vec<String>,
    /// Quality analysis, if scoring ran.
    pub quality_analysis: Option<QualityAnalysis>,
    /// Text analysis, if scoring ran.
    pub text_analysis: Option<TextAnalysis>,
    /// Combined heuristic score before any adjustment, if scoring ran.
    pub combined_score: Option<f64>,
    /// Issuer of the matched original.
    pub existing_issuer: Option<String>,
    /// Truncated extracted text.
    pub ocr_preview: String,
}

impl VerificationReport {
    /// Explanation joined with `"; "`.
    #[must_use]
    pub fn explanation_text(&self) -> String {
        self.explanation.join("; ")
    }
}

/// Outcome of a re-verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverifyReport {
    /// Re-scored document.
    pub document_id: String,
    /// Verifier that asked.
    pub verifier_id: String,
    /// Score written to the record.
    pub new_suspicion_score: f64,
    /// Whether the verifier was newly added.
    pub verifier_added: bool,
}

/// Stored analysis projection of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisView {
    /// Record identifier.
    pub document_id: String,
    /// Original file name.
    pub filename: String,
    /// Content source.
    pub source: String,
    /// Hash, or `"Not generated"`.
    pub hash: String,
    /// Current score.
    pub suspicion_score: f64,
    /// Current status.
    pub status: DocumentStatus,
    /// Lookup branch taken at creation.
    pub verification_state: VerificationState,
    /// `status == verified`.
    pub hash_verified: bool,
    /// Number of identities that examined the record.
    pub verified_by: usize,
    /// Owning issuer, if known.
    pub existing_issuer: Option<String>,
    /// Explanation recorded at creation.
    pub explanation: Vec<String>,
    /// Full extracted text.
    pub ocr_text: String,
    /// Creation time (Unix seconds).
    pub created_at: i64,
}

/// Count of records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// `verified` records.
    pub verified: usize,
    /// `pending_review` records.
    pub pending_review: usize,
    /// `suspicious` records.
    pub suspicious: usize,
}

impl StatusSummary {
    /// Tally statuses.
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a DocumentStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status {
                DocumentStatus::Verified => summary.verified += 1,
                DocumentStatus::PendingReview => summary.pending_review += 1,
                DocumentStatus::Suspicious => summary.suspicious += 1,
                DocumentStatus::Pending => {},
            }
        }
        summary
    }
}

/// One line in a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Record identifier.
    pub document_id: String,
    /// Original file name.
    pub filename: String,
    /// Current status.
    pub status: DocumentStatus,
    /// Current score.
    pub suspicion_score: f64,
    /// Document type label.
    pub document_type: String,
    /// How the record was created.
    pub origin: RecordOrigin,
    /// Truncated extracted text.
    pub ocr_preview: String,
    /// Creation time (Unix seconds).
    pub created_at: i64,
}

/// Documents examined by a verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierDocuments {
    /// Verifier identity.
    pub verifier_id: String,
    /// Verifier display name.
    pub verifier_name: String,
    /// Verifier organization.
    pub organization: String,
    /// Per-status counts.
    pub status_summary: StatusSummary,
    /// Documents, oldest first.
    pub documents: Vec<DocumentSummary>,
}

/// Originals registered by an issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerDocuments {
    /// Issuer identity.
    pub issuer_id: String,
    /// Issuer display name.
    pub issuer_name: String,
    /// Documents, oldest first.
    pub documents: Vec<DocumentSummary>,
}

/// Generate a random identifier with a kind prefix.
pub(crate) fn generate_id(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u64 = rng.gen();
    format!("{}-{:016x}", prefix, id)
}

/// Current Unix time in seconds.
pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
