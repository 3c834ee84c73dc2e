//! End-to-end verification through the public engine API.

use std::collections::BTreeMap;

use certverify_core::{
    DocumentStatus, IssueRequest, VerificationEngine, VerificationState, Verdict, VerifyConfig,
    VerifyRequest,
};

use crate::common::*;

struct Fixture {
    engine: VerificationEngine,
    institute_id: String,
    issuer_id: String,
    verifier_id: String,
    _dir: tempfile::TempDir,
    dir_path: std::path::PathBuf,
}

fn fixture(config: VerifyConfig, text: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_text(config, text);
    let institute = engine
        .registry()
        .add_institute("Institute X", "university", Some("institute-x-secret"))
        .unwrap();
    let issuer = engine
        .registry()
        .add_issuer("Registrar", "registrar@institute-x.edu", &institute.id)
        .unwrap();
    let verifier = engine
        .registry()
        .add_verifier("Background Checks Ltd", "Acme")
        .unwrap();
    Fixture {
        engine,
        institute_id: institute.id,
        issuer_id: issuer.id,
        verifier_id: verifier.id,
        dir_path: dir.path().to_path_buf(),
        _dir: dir,
    }
}

fn upload(f: &Fixture, path: String, institute: bool) -> VerifyRequest {
    VerifyRequest {
        verifier_id: f.verifier_id.clone(),
        filename: "upload.png".into(),
        source: path,
        institute_id: institute.then(|| f.institute_id.clone()),
        document_type: Some("degree".into()),
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn scenario_registered_original_is_authentic() {
    let f = fixture(VerifyConfig::default(), VAGUE_TEXT);
    let path = write(&f.dir_path, "degree.png", &murky_png());

    f.engine
        .register_issued(&IssueRequest {
            issuer_id: f.issuer_id.clone(),
            source: path.clone(),
            filename: "degree.png".into(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    let report = f.engine.verify_upload(&upload(&f, path, true)).await.unwrap();
    assert!(approx(report.suspicion_score, 0.0));
    assert_eq!(report.status, DocumentStatus::Verified);
    assert_eq!(report.verdict, Verdict::Authentic);
    assert_eq!(report.existing_issuer.as_deref(), Some(f.issuer_id.as_str()));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "verified");
    assert_eq!(json["verdict"], "authentic");
    assert_eq!(json["verification_state"], "hash_verified");
}

#[tokio::test]
async fn scenario_unknown_hash_scores_and_caps() {
    let f = fixture(VerifyConfig::default(), VAGUE_TEXT);
    let path = write(&f.dir_path, "forged.png", &blurry_dark_png());

    let report = f.engine.verify_upload(&upload(&f, path, true)).await.unwrap();
    assert_eq!(report.verification_state, VerificationState::HashNotFound);
    assert!(approx(report.combined_score.unwrap(), 0.56));
    assert!(approx(report.suspicion_score, 0.8));
    assert_eq!(report.status, DocumentStatus::Suspicious);
}

#[tokio::test]
async fn scenario_hash_unavailable_downgrades_clean_document() {
    let config = VerifyConfig {
        fallback_secret: Some(String::new()),
        ..VerifyConfig::default()
    };
    let f = fixture(config, GENUINE_TEXT);
    let path = write(&f.dir_path, "scan.png", &clean_png());

    let report = f.engine.verify_upload(&upload(&f, path, false)).await.unwrap();
    assert_eq!(report.verification_state, VerificationState::HashUnavailable);
    assert!(approx(report.suspicion_score, 0.0));
    assert_eq!(report.verdict, Verdict::LikelyAuthentic);
    assert_eq!(report.status, DocumentStatus::PendingReview);
}

#[tokio::test]
async fn hash_unavailable_keeps_unpenalized_score() {
    // Quality 0.7 and text 0.6: 0.28 + 0.36 = 0.64.
    let f = fixture(VerifyConfig::default(), VAGUE_TEXT);
    let path = write(&f.dir_path, "murky.png", &murky_png());

    let report = f.engine.verify_upload(&upload(&f, path, false)).await.unwrap();
    assert_eq!(report.verification_state, VerificationState::HashUnavailable);
    assert!(approx(report.suspicion_score, 0.64));
    assert_eq!(report.verdict, Verdict::RequiresReview);
    assert_eq!(report.status, DocumentStatus::PendingReview);
}

#[tokio::test]
async fn hash_unavailable_highly_suspicious_is_suspicious() {
    // Quality 0.7 and insufficient text 0.8: 0.28 + 0.48 = 0.76.
    let f = fixture(VerifyConfig::default(), "");
    let path = write(&f.dir_path, "murky.png", &murky_png());

    let report = f.engine.verify_upload(&upload(&f, path, false)).await.unwrap();
    assert!(approx(report.suspicion_score, 0.76));
    assert_eq!(report.verdict, Verdict::HighlySuspicious);
    assert_eq!(report.status, DocumentStatus::Suspicious);
    assert!(report
        .explanation
        .contains(&"Insufficient text extracted".to_string()));
}

#[tokio::test]
async fn undecodable_document_uses_quality_fallback() {
    // Quality 0.8 and text 0.0: 0.32, plus 0.3 for the unknown hash.
    let f = fixture(VerifyConfig::default(), GENUINE_TEXT);
    let path = write(&f.dir_path, "scan.pdf", b"%PDF-1.4\n% not rasterized\n");
    let mut request = upload(&f, path, true);
    request.filename = "scan.pdf".into();

    let report = f.engine.verify_upload(&request).await.unwrap();
    assert!(approx(report.combined_score.unwrap(), 0.32));
    assert!(approx(report.suspicion_score, 0.62));
    assert_eq!(report.status, DocumentStatus::Suspicious);
    assert_eq!(report.explanation, vec!["Image could not be decoded"]);
}

#[tokio::test]
async fn other_institute_secret_does_not_match() {
    let f = fixture(VerifyConfig::default(), GENUINE_TEXT);
    let path = write(&f.dir_path, "degree.png", &clean_png());
    f.engine
        .register_issued(&IssueRequest {
            issuer_id: f.issuer_id.clone(),
            source: path.clone(),
            filename: "degree.png".into(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    let other = f
        .engine
        .registry()
        .add_institute("Institute Y", "college", Some("institute-y-secret"))
        .unwrap();
    let mut request = upload(&f, path, true);
    request.institute_id = Some(other.id);

    let report = f.engine.verify_upload(&request).await.unwrap();
    assert_eq!(report.verification_state, VerificationState::HashNotFound);
    assert!(approx(report.suspicion_score, 0.3));
    assert_eq!(report.status, DocumentStatus::PendingReview);
}

#[tokio::test]
async fn earlier_verifier_upload_never_vouches() {
    let config = VerifyConfig {
        fallback_secret: Some("shared".into()),
        ..VerifyConfig::default()
    };
    let f = fixture(config, GENUINE_TEXT);
    let path = write(&f.dir_path, "scan.png", &clean_png());

    let first = f.engine.verify_upload(&upload(&f, path.clone(), false)).await.unwrap();
    let second = f.engine.verify_upload(&upload(&f, path, false)).await.unwrap();

    assert_eq!(first.hash, second.hash);
    assert_ne!(first.document_id, second.document_id);
    assert_eq!(second.verification_state, VerificationState::HashNotFound);
}

#[tokio::test]
async fn listing_and_analysis_views() {
    let f = fixture(VerifyConfig::default(), GENUINE_TEXT);
    let path = write(&f.dir_path, "scan.png", &clean_png());
    let report = f.engine.verify_upload(&upload(&f, path, true)).await.unwrap();

    let view = f.engine.analysis(&report.document_id).unwrap();
    assert_eq!(view.filename, "upload.png");
    assert_eq!(view.status, report.status);
    assert_eq!(view.ocr_text, GENUINE_TEXT);
    assert_eq!(view.verified_by, 1);

    let listing = f.engine.documents_for_verifier(&f.verifier_id).unwrap();
    assert_eq!(listing.documents.len(), 1);
    assert_eq!(listing.documents[0].document_type, "degree");
    assert!(listing.documents[0].ocr_preview.ends_with("..."));

    assert!(f.engine.analysis("doc-missing").unwrap_err().is_client_error());
}
