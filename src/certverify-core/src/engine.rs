//! Certificate verification engine.
//!
//! Verification of an upload runs:
//! 1. Upload validation (file type, verifier, institute)
//! 2. Content fetch (the only fatal failure)
//! 3. Keyed hash with the institute secret
//! 4. Hash lookup against registered originals
//! 5. Text extraction
//! 6. Heuristic scoring, skipped when the hash matched
//! 7. Persisting the new record
//!
//! ## Decision table
//!
//! | Lookup | Score | Status |
//! |---|---|---|
//! | Matched | `0.0` | `verified` |
//! | NotFound | `min(0.8, combined + 0.3)` | `pending_review` below `0.4`, else `suspicious` |
//! | HashUnavailable | `combined` | `pending_review` unless verdict is `highly_suspicious` or `error` |
//!
//! A hash match overrides every heuristic signal.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::VerifyConfig;
use crate::error::VerifyError;
use crate::hash::{short, HashComputer};
use crate::ocr::{extract_or_tag, TesseractExtractor, TextExtractor};
use crate::registry::{IdentityRegistry, SecretKeyProvider};
use crate::resolver::{AuthenticityResolver, ResolverState};
use crate::scoring::{round2, AnalysisResult, SuspicionScorer, ANALYSIS_FALLBACK_SCORE};
use crate::source::{ContentSource, ReferenceSource};
use crate::store::{DocumentStore, MemoryStore};
use crate::types::{
    now_unix, AnalysisView, DocumentRecord, DocumentStatus, DocumentSummary, IssueRequest,
    IssuerDocuments, OcrData, RecordOrigin, ReverifyReport, StatusSummary, VerificationReport,
    VerificationState, Verdict, VerifierDocuments, VerifyRequest,
};
use crate::upload::{
    preview, validate_content, validate_filename, LISTING_PREVIEW_CHARS, OCR_PREVIEW_CHARS,
};

/// Penalty added to the heuristic score when the hash is unknown.
pub const NOT_FOUND_PENALTY: f64 = 0.3;
/// Ceiling for the penalized score.
pub const NOT_FOUND_SCORE_CAP: f64 = 0.8;
/// Penalized scores below this stay `pending_review`.
pub const NOT_FOUND_REVIEW_BELOW: f64 = 0.4;

/// Final `(score, verdict, status)` for one verification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Persisted suspicion score.
    pub score: f64,
    /// Reported verdict.
    pub verdict: Verdict,
    /// Persisted status.
    pub status: DocumentStatus,
}

/// Map a lookup outcome and optional analysis onto the final decision.
///
/// `analysis` is ignored for a match. A missing analysis on the other
/// branches is treated as a scoring failure.
#[must_use]
pub fn decide(state: &ResolverState, analysis: Option<&AnalysisResult>) -> Decision {
    let (combined, heuristic_verdict) = analysis.map_or(
        (ANALYSIS_FALLBACK_SCORE, Verdict::Error),
        |a| (a.combined_score(), a.verdict()),
    );

    match state {
        ResolverState::Matched(_) => Decision {
            score: 0.0,
            verdict: Verdict::Authentic,
            status: DocumentStatus::Verified,
        },
        ResolverState::NotFound => {
            let score = round2((combined + NOT_FOUND_PENALTY).min(NOT_FOUND_SCORE_CAP));
            let status = if score < NOT_FOUND_REVIEW_BELOW {
                DocumentStatus::PendingReview
            } else {
                DocumentStatus::Suspicious
            };
            let verdict = match heuristic_verdict {
                Verdict::Error => Verdict::Error,
                _ => Verdict::from_score(score),
            };
            Decision {
                score,
                verdict,
                status,
            }
        },
        ResolverState::HashUnavailable => {
            let status = match heuristic_verdict {
                Verdict::LikelyAuthentic | Verdict::RequiresReview => {
                    DocumentStatus::PendingReview
                },
                Verdict::HighlySuspicious | Verdict::Authentic | Verdict::Error => {
                    DocumentStatus::Suspicious
                },
            };
            Decision {
                score: combined,
                verdict: heuristic_verdict,
                status,
            }
        },
    }
}

/// The certificate verification engine.
///
/// Owns the collaborators for one process; every operation goes through it.
pub struct VerificationEngine {
    config: VerifyConfig,
    store: Arc<dyn DocumentStore>,
    registry: Arc<IdentityRegistry>,
    secrets: Arc<dyn SecretKeyProvider>,
    source: Arc<dyn ContentSource>,
    extractor: Arc<dyn TextExtractor>,
    hasher: HashComputer,
    scorer: SuspicionScorer,
}

impl VerificationEngine {
    /// Create an engine with default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails.
    pub fn new() -> Result<Self, VerifyError> {
        Self::with_config(VerifyConfig::default())
    }

    /// Create an engine from configuration.
    ///
    /// Opens persisted state when `data_dir` is set, and uses the
    /// filesystem/HTTP source with the external OCR command.
    ///
    /// # Errors
    ///
    /// Returns error if persisted state cannot be loaded or the HTTP client
    /// cannot be built.
    pub fn with_config(config: VerifyConfig) -> Result<Self, VerifyError> {
        info!(
            data_dir = ?config.data_dir,
            fetch_timeout_secs = config.fetch_timeout.as_secs(),
            ocr_command = %config.ocr_command,
            fallback_secret = config.fallback_secret.is_some(),
            "VerificationEngine: starting initialization"
        );

        let (store, registry) = match &config.data_dir {
            Some(dir) => (MemoryStore::open(dir)?, IdentityRegistry::open(dir)?),
            None => (MemoryStore::new(), IdentityRegistry::new()),
        };
        let source = ReferenceSource::new(config.fetch_timeout, config.max_upload_bytes)?;
        let extractor = TesseractExtractor::new(config.ocr_command.clone(), config.ocr_timeout);

        Ok(Self::with_components(
            config,
            Arc::new(store),
            Arc::new(registry),
            Arc::new(source),
            Arc::new(extractor),
        ))
    }

    /// Create an engine from explicit collaborators.
    ///
    /// The registry doubles as the secret key provider.
    #[must_use]
    pub fn with_components(
        config: VerifyConfig,
        store: Arc<dyn DocumentStore>,
        registry: Arc<IdentityRegistry>,
        source: Arc<dyn ContentSource>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let secrets: Arc<dyn SecretKeyProvider> = registry.clone();
        Self {
            config,
            store,
            registry,
            secrets,
            source,
            extractor,
            hasher: HashComputer::new(),
            scorer: SuspicionScorer::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Identity registry.
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Verify a document uploaded by a verifier.
    ///
    /// # Errors
    ///
    /// [`VerifyError::SourceUnavailable`] if the content cannot be fetched;
    /// client errors for a bad upload or unknown identities. Hashing,
    /// extraction and scoring failures degrade and never error.
    #[instrument(skip(self, request), fields(verifier_id = %request.verifier_id))]
    pub async fn verify_upload(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerificationReport, VerifyError> {
        validate_filename(&self.config, &request.filename)?;
        let verifier = self.registry.verifier(&request.verifier_id)?;
        if let Some(institute_id) = &request.institute_id {
            self.registry.institute(institute_id)?;
        }

        let secret = self.upload_secret(request);
        let hashed = self
            .hasher
            .compute_from_source(&request.source, secret.as_deref(), self.source.as_ref())
            .await?;
        let content = hashed.content;
        validate_content(&self.config, &content)?;

        let hash = hashed
            .digest
            .map_err(|e| warn!(error = %e, "Hash unavailable, continuing with heuristics"))
            .ok();

        let state = AuthenticityResolver::new(self.store.as_ref()).resolve(hash.as_deref())?;
        let ocr_text = extract_or_tag(self.extractor.as_ref(), &content).await;

        let analysis = match &state {
            ResolverState::Matched(_) => None,
            ResolverState::NotFound | ResolverState::HashUnavailable => {
                Some(self.scorer.analyze(&content, &ocr_text))
            },
        };
        let decision = decide(&state, analysis.as_ref());
        let existing_issuer = state.existing_issuer().map(str::to_string);

        let explanation = match (&state, &analysis) {
            (ResolverState::Matched(original), _) => vec![format!(
                "Document hash matches registered original {}",
                original.id
            )],
            (_, Some(analysis)) => analysis.explanation().to_vec(),
            (_, None) => Vec::new(),
        };

        let mut metadata = request.metadata.clone();
        metadata.insert("original_filename".into(), request.filename.clone());
        metadata.insert("file_size".into(), content.len().to_string());
        metadata.insert("upload_method".into(), "verifier_upload".into());
        metadata.insert(
            "document_type".into(),
            request
                .document_type
                .clone()
                .unwrap_or_else(|| "unknown".into()),
        );
        metadata.insert("verifier_name".into(), verifier.name.clone());
        metadata.insert("verifier_organization".into(), verifier.organization.clone());

        let now = now_unix();
        let record = self.store.insert(DocumentRecord {
            id: String::new(),
            hash: hash.clone(),
            suspicion_score: decision.score,
            verdict: decision.verdict,
            status: decision.status,
            origin: RecordOrigin::VerifierUpload,
            verification_state: state.verification_state(),
            issuer_ref: existing_issuer.clone(),
            verified_by: vec![verifier.id.clone()],
            source: request.source.clone(),
            ocr: OcrData::new(ocr_text, self.extractor.method()),
            explanation: explanation.clone(),
            metadata,
            created_at: now,
            updated_at: now,
        })?;

        info!(
            document_id = %record.id,
            state = %state.verification_state(),
            score = decision.score,
            verdict = %decision.verdict,
            status = %decision.status,
            "Verification complete"
        );

        Ok(VerificationReport {
            document_id: record.id,
            hash,
            suspicion_score: decision.score,
            verdict: decision.verdict,
            status: decision.status,
            verification_state: state.verification_state(),
            explanation,
            combined_score: analysis.as_ref().map(AnalysisResult::combined_score),
            quality_analysis: analysis.as_ref().map(|a| a.quality.clone()),
            text_analysis: analysis.map(|a| a.text),
            existing_issuer,
            ocr_preview: preview(&record.ocr.extracted_text, OCR_PREVIEW_CHARS),
        })
    }

    /// Register an original on behalf of its issuer.
    ///
    /// # Errors
    ///
    /// [`VerifyError::HashComputation`] if the institute has no usable
    /// secret; [`VerifyError::DuplicateHash`] if the content is already
    /// registered; source and client errors as for [`Self::verify_upload`].
    #[instrument(skip(self, request), fields(issuer_id = %request.issuer_id))]
    pub async fn register_issued(
        &self,
        request: &IssueRequest,
    ) -> Result<DocumentRecord, VerifyError> {
        validate_filename(&self.config, &request.filename)?;
        let issuer = self.registry.issuer(&request.issuer_id)?;
        let institute = self.registry.institute(&issuer.institute_id)?;

        let secret = self.secrets.secret_for_institute(&institute.id)?;
        let hashed = self
            .hasher
            .compute_from_source(&request.source, Some(&secret), self.source.as_ref())
            .await?;
        let content = hashed.content;
        validate_content(&self.config, &content)?;
        let hash = hashed.digest?;
        let ocr_text = extract_or_tag(self.extractor.as_ref(), &content).await;

        let mut metadata = request.metadata.clone();
        metadata.insert("original_filename".into(), request.filename.clone());
        metadata.insert("file_size".into(), content.len().to_string());
        metadata.insert("upload_method".into(), "issuer_upload".into());
        metadata.insert("institute_id".into(), institute.id.clone());
        metadata.insert("institute_name".into(), institute.name.clone());

        let now = now_unix();
        let record = self.store.insert(DocumentRecord {
            id: String::new(),
            hash: Some(hash.clone()),
            suspicion_score: 0.0,
            verdict: Verdict::Authentic,
            status: DocumentStatus::Verified,
            origin: RecordOrigin::Issued,
            verification_state: VerificationState::HashVerified,
            issuer_ref: Some(issuer.id.clone()),
            verified_by: vec![issuer.id.clone()],
            source: request.source.clone(),
            ocr: OcrData::new(ocr_text, self.extractor.method()),
            explanation: vec![format!("Registered original issued by {}", issuer.name)],
            metadata,
            created_at: now,
            updated_at: now,
        })?;

        info!(
            document_id = %record.id,
            hash_prefix = %short(&hash),
            institute_id = %institute.id,
            "Original registered"
        );
        Ok(record)
    }

    /// Re-score a stored document at a verifier's request.
    ///
    /// Adds the verifier and overwrites only the score. Originals keep 0.0.
    /// When the content or text cannot be re-read the score becomes 0.5.
    ///
    /// # Errors
    ///
    /// [`VerifyError::NotFound`] for an unknown document or verifier.
    #[instrument(skip(self))]
    pub async fn reverify(
        &self,
        document_id: &str,
        verifier_id: &str,
    ) -> Result<ReverifyReport, VerifyError> {
        self.registry.verifier(verifier_id)?;
        let record = self
            .store
            .get(document_id)?
            .ok_or_else(|| VerifyError::not_found("document", document_id))?;

        let new_score = if record.is_issued() {
            0.0
        } else {
            self.rescore(&record).await
        };
        let verifier_added = self
            .store
            .record_reverification(document_id, verifier_id, new_score)?;

        info!(
            document_id = %document_id,
            new_score = new_score,
            verifier_added = verifier_added,
            "Re-verification complete"
        );
        Ok(ReverifyReport {
            document_id: document_id.to_string(),
            verifier_id: verifier_id.to_string(),
            new_suspicion_score: new_score,
            verifier_added,
        })
    }

    /// Stored analysis for a document.
    ///
    /// # Errors
    ///
    /// [`VerifyError::NotFound`] for an unknown document.
    pub fn analysis(&self, document_id: &str) -> Result<AnalysisView, VerifyError> {
        let record = self
            .store
            .get(document_id)?
            .ok_or_else(|| VerifyError::not_found("document", document_id))?;

        Ok(AnalysisView {
            document_id: record.id.clone(),
            filename: record.filename().to_string(),
            source: record.source.clone(),
            hash: record
                .hash
                .clone()
                .unwrap_or_else(|| "Not generated".to_string()),
            suspicion_score: record.suspicion_score,
            status: record.status,
            verification_state: record.verification_state,
            hash_verified: record.status == DocumentStatus::Verified,
            verified_by: record.verified_by.len(),
            existing_issuer: record.issuer_ref,
            explanation: record.explanation,
            ocr_text: record.ocr.extracted_text,
            created_at: record.created_at,
        })
    }

    /// Documents a verifier has examined, with per-status counts.
    ///
    /// # Errors
    ///
    /// [`VerifyError::NotFound`] for an unknown verifier.
    pub fn documents_for_verifier(
        &self,
        verifier_id: &str,
    ) -> Result<VerifierDocuments, VerifyError> {
        let verifier = self.registry.verifier(verifier_id)?;
        let records = self.store.list_by_verifier(verifier_id)?;
        debug!(verifier_id = %verifier_id, count = records.len(), "Listing verifier documents");

        Ok(VerifierDocuments {
            verifier_id: verifier.id,
            verifier_name: verifier.name,
            organization: verifier.organization,
            status_summary: StatusSummary::tally(records.iter().map(|r| &r.status)),
            documents: records.iter().map(summarize).collect(),
        })
    }

    /// Originals registered by an issuer.
    ///
    /// # Errors
    ///
    /// [`VerifyError::NotFound`] for an unknown issuer.
    pub fn documents_for_issuer(&self, issuer_id: &str) -> Result<IssuerDocuments, VerifyError> {
        let issuer = self.registry.issuer(issuer_id)?;
        let documents = self
            .store
            .list_by_issuer(issuer_id)?
            .iter()
            .filter(|r| r.is_issued())
            .map(summarize)
            .collect();

        Ok(IssuerDocuments {
            issuer_id: issuer.id,
            issuer_name: issuer.name,
            documents,
        })
    }

    /// Run only the heuristic scorer. Nothing is hashed or stored.
    #[must_use]
    pub fn analyze_only(&self, content: &[u8], ocr_text: &str) -> AnalysisResult {
        self.scorer.analyze(content, ocr_text)
    }

    /// Fetch a document and score it; extracts text unless given.
    ///
    /// # Errors
    ///
    /// [`VerifyError::SourceUnavailable`] if the content cannot be fetched.
    pub async fn analyze_source(
        &self,
        reference: &str,
        ocr_text: Option<&str>,
    ) -> Result<AnalysisResult, VerifyError> {
        let content = self.source.fetch(reference).await?;
        let text = match ocr_text {
            Some(text) => text.to_string(),
            None => extract_or_tag(self.extractor.as_ref(), &content).await,
        };
        Ok(self.analyze_only(&content, &text))
    }

    /// Secret keying an upload's hash, if one is usable.
    fn upload_secret(&self, request: &VerifyRequest) -> Option<String> {
        match &request.institute_id {
            Some(institute_id) => match self.secrets.secret_for_institute(institute_id) {
                Ok(secret) => Some(secret),
                Err(e) => {
                    warn!(institute_id = %institute_id, error = %e, "No usable institute secret");
                    None
                },
            },
            None => {
                if self.config.fallback_secret.is_none() {
                    warn!("No institute named and no fallback secret configured");
                }
                self.config.fallback_secret.clone()
            },
        }
    }

    async fn rescore(&self, record: &DocumentRecord) -> f64 {
        let text = &record.ocr.extracted_text;
        if record.source.is_empty() || text.is_empty() {
            debug!(document_id = %record.id, "Nothing to re-analyze, using fallback score");
            return ANALYSIS_FALLBACK_SCORE;
        }
        match self.source.fetch(&record.source).await {
            Ok(content) => self.scorer.analyze(&content, text).combined_score(),
            Err(e) => {
                warn!(document_id = %record.id, error = %e, "Re-analysis source unavailable");
                ANALYSIS_FALLBACK_SCORE
            },
        }
    }
}

fn summarize(record: &DocumentRecord) -> DocumentSummary {
    DocumentSummary {
        document_id: record.id.clone(),
        filename: record.filename().to_string(),
        status: record.status,
        suspicion_score: record.suspicion_score,
        document_type: record
            .metadata
            .get("document_type")
            .cloned()
            .unwrap_or_else(|| "unknown".into()),
        origin: record.origin,
        ocr_preview: preview(&record.ocr.extracted_text, LISTING_PREVIEW_CHARS),
        created_at: record.created_at,
    }
}
