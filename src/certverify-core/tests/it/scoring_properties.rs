//! Property-based tests for scoring and the verification decision.
//!
//! These check the score bounds and the hash-match override over arbitrary
//! analyzer inputs.

use std::collections::BTreeMap;
use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use proptest::prelude::*;

use certverify_core::scoring::combined_score;
use certverify_core::types::OcrData;
use certverify_core::{
    decide, DocumentRecord, DocumentStatus, HashComputer, RecordOrigin, ResolverState,
    SuspicionScorer, TextPatternAnalyzer, VerificationState, Verdict,
};

/// Strategy for small grayscale images.
fn image_strategy() -> impl Strategy<Value = GrayImage> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<u8>(), (w * h) as usize)
            .prop_map(move |px| GrayImage::from_raw(w, h, px).unwrap())
    })
}

fn png(img: &GrayImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn original() -> DocumentRecord {
    DocumentRecord {
        id: "doc-0".into(),
        hash: Some("ab".repeat(64)),
        suspicion_score: 0.0,
        verdict: Verdict::Authentic,
        status: DocumentStatus::Verified,
        origin: RecordOrigin::Issued,
        verification_state: VerificationState::HashVerified,
        issuer_ref: Some("iss-1".into()),
        verified_by: vec!["iss-1".into()],
        source: String::new(),
        ocr: OcrData::default(),
        explanation: vec![],
        metadata: BTreeMap::new(),
        created_at: 0,
        updated_at: 0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Score bounds
    // ========================================================================

    #[test]
    fn combined_score_is_bounded(
        img in image_strategy(),
        text in ".{0,200}",
    ) {
        let result = SuspicionScorer::new().analyze(&png(&img), &text);
        let score = result.combined_score();
        prop_assert!((0.0..=1.0).contains(&score));
        prop_assert!((0.0..=1.0).contains(&result.quality_score()));
        prop_assert!((0.0..=1.0).contains(&result.text_score()));
        prop_assert!(!result.explanation().is_empty());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let result = SuspicionScorer::new().analyze(&bytes, "");
        prop_assert!((0.0..=1.0).contains(&result.combined_score()));
    }

    #[test]
    fn short_text_scores_fallback(text in "[a-z ]{0,9}") {
        let analysis = TextPatternAnalyzer::new().analyze(&text);
        prop_assert!((analysis.score() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn combined_score_has_two_decimals(q in 0.0f64..=1.0, t in 0.0f64..=1.0) {
        let score = combined_score(q, t).unwrap();
        prop_assert!((score * 100.0 - (score * 100.0).round()).abs() < 1e-6);
    }

    // ========================================================================
    // Decision table
    // ========================================================================

    #[test]
    fn hash_match_overrides_heuristics(
        img in image_strategy(),
        text in ".{0,120}",
    ) {
        let analysis = SuspicionScorer::new().analyze(&png(&img), &text);
        let matched = ResolverState::Matched(Box::new(original()));
        let decision = decide(&matched, Some(&analysis));
        prop_assert_eq!(decision.score, 0.0);
        prop_assert_eq!(decision.status, DocumentStatus::Verified);
        prop_assert_eq!(decision.verdict, Verdict::Authentic);
    }

    #[test]
    fn unknown_hash_is_penalized_and_capped(
        img in image_strategy(),
        text in ".{0,120}",
    ) {
        let analysis = SuspicionScorer::new().analyze(&png(&img), &text);
        let decision = decide(&ResolverState::NotFound, Some(&analysis));
        prop_assert!(decision.score <= 0.8 + 1e-12);
        prop_assert!(decision.score >= 0.3 - 1e-12);
        let expected = if decision.score < 0.4 {
            DocumentStatus::PendingReview
        } else {
            DocumentStatus::Suspicious
        };
        prop_assert_eq!(decision.status, expected);
    }

    #[test]
    fn hash_unavailable_keeps_combined_score(
        img in image_strategy(),
        text in ".{0,120}",
    ) {
        let analysis = SuspicionScorer::new().analyze(&png(&img), &text);
        let decision = decide(&ResolverState::HashUnavailable, Some(&analysis));
        prop_assert_eq!(decision.score, analysis.combined_score());
        prop_assert_eq!(decision.verdict, analysis.verdict());
        prop_assert_ne!(decision.status, DocumentStatus::Verified);
    }

    // ========================================================================
    // Hashing
    // ========================================================================

    #[test]
    fn hash_is_deterministic(
        content in prop::collection::vec(any::<u8>(), 0..1024),
        key in "[ -~]{1,64}",
    ) {
        let hasher = HashComputer::new();
        let a = hasher.compute(&content, &key).unwrap();
        let b = hasher.compute(&content, &key).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn distinct_content_distinct_hash(
        content in prop::collection::vec(any::<u8>(), 1..512),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut altered = content.clone();
        let i = flip.index(altered.len());
        altered[i] ^= 1 << bit;

        let hasher = HashComputer::new();
        prop_assert_ne!(
            hasher.compute(&content, "institute").unwrap(),
            hasher.compute(&altered, "institute").unwrap()
        );
    }
}
