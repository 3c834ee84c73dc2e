//! State survives an engine restart when a data directory is configured.

use std::collections::BTreeMap;

use certverify_core::{
    DocumentStatus, IssueRequest, VerificationEngine, VerificationState, VerifyConfig,
    VerifyRequest,
};

use crate::common::*;

fn config(dir: &std::path::Path) -> VerifyConfig {
    VerifyConfig {
        data_dir: Some(dir.to_path_buf()),
        // Never resolves, so extraction always degrades to tagged text.
        ocr_command: "certverify-test-missing-ocr".into(),
        ..VerifyConfig::default()
    }
}

#[tokio::test]
async fn registered_original_matches_after_restart() {
    let data = tempfile::tempdir().unwrap();
    let files = tempfile::tempdir().unwrap();
    let path = write(files.path(), "degree.png", &clean_png());

    let (institute_id, verifier_id, original_id) = {
        let engine = VerificationEngine::with_config(config(data.path())).unwrap();
        let institute = engine
            .registry()
            .add_institute("Institute X", "university", Some("x-secret"))
            .unwrap();
        let issuer = engine
            .registry()
            .add_issuer("Registrar", "registrar@x.edu", &institute.id)
            .unwrap();
        let verifier = engine.registry().add_verifier("HR", "Acme").unwrap();
        let original = engine
            .register_issued(&IssueRequest {
                issuer_id: issuer.id,
                source: path.clone(),
                filename: "degree.png".into(),
                metadata: BTreeMap::new(),
            })
            .await
            .unwrap();
        (institute.id, verifier.id, original.id)
    };

    assert!(data.path().join("documents.json").exists());
    assert!(data.path().join("identities.json").exists());

    let engine = VerificationEngine::with_config(config(data.path())).unwrap();
    let report = engine
        .verify_upload(&VerifyRequest {
            verifier_id: verifier_id.clone(),
            source: path,
            filename: "degree.png".into(),
            institute_id: Some(institute_id),
            document_type: None,
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    assert_eq!(report.verification_state, VerificationState::HashVerified);
    assert_eq!(report.status, DocumentStatus::Verified);
    assert!(report.ocr_preview.starts_with("ERROR:"));

    let original = engine.analysis(&original_id).unwrap();
    assert!(original.hash_verified);
    let listing = engine.documents_for_verifier(&verifier_id).unwrap();
    assert_eq!(listing.status_summary.verified, 1);
}

#[tokio::test]
async fn secrets_are_not_written_to_documents() {
    let data = tempfile::tempdir().unwrap();
    let files = tempfile::tempdir().unwrap();
    let path = write(files.path(), "degree.png", &clean_png());

    let engine = VerificationEngine::with_config(config(data.path())).unwrap();
    let institute = engine
        .registry()
        .add_institute("Institute X", "university", Some("very-private-key"))
        .unwrap();
    let issuer = engine
        .registry()
        .add_issuer("Registrar", "registrar@x.edu", &institute.id)
        .unwrap();
    engine
        .register_issued(&IssueRequest {
            issuer_id: issuer.id,
            source: path,
            filename: "degree.png".into(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    let documents = std::fs::read_to_string(data.path().join("documents.json")).unwrap();
    assert!(!documents.contains("very-private-key"));
}
