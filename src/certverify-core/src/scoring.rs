//! Suspicion scoring: quality + text analysis combined into one verdict.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::quality::{ImageQualityAnalyzer, QualityAnalysis};
use crate::text::{TextAnalysis, TextPatternAnalyzer};
use crate::types::Verdict;

/// Weight of the image quality score.
pub const QUALITY_WEIGHT: f64 = 0.4;
/// Weight of the text pattern score.
pub const TEXT_WEIGHT: f64 = 0.6;

/// Combined score used when scoring itself fails.
pub const ANALYSIS_FALLBACK_SCORE: f64 = 0.5;

/// Explanation when no issue was flagged.
pub const CLEAN_EXPLANATION: &str = "Document appears to be authentic.";
/// Explanation when scoring failed.
pub const FAILED_EXPLANATION: &str = "Could not analyze document properly";

/// Result of one heuristic analysis. Produced fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Quality sub-analysis.
    pub quality: QualityAnalysis,
    /// Text sub-analysis.
    pub text: TextAnalysis,
    /// Combined score outcome.
    pub outcome: ScoreOutcome,
}

impl AnalysisResult {
    /// Quality component score.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        self.quality.score()
    }

    /// Text component score.
    #[must_use]
    pub fn text_score(&self) -> f64 {
        self.text.score()
    }

    /// Combined score in `[0, 1]`, rounded to 2 decimals.
    #[must_use]
    pub fn combined_score(&self) -> f64 {
        self.outcome.combined_score()
    }

    /// Verdict for the combined score.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.outcome.verdict()
    }

    /// Ordered explanation phrases.
    #[must_use]
    pub fn explanation(&self) -> &[String] {
        self.outcome.explanation()
    }

    /// Explanation joined with `"; "`.
    #[must_use]
    pub fn explanation_text(&self) -> String {
        self.explanation().join("; ")
    }
}

/// Why combining failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFailure {
    /// A component score was NaN or infinite.
    NonFiniteScore,
}

/// Combined scoring outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// Scores combined normally.
    Scored {
        /// Rounded combined score.
        combined_score: f64,
        /// Threshold verdict.
        verdict: Verdict,
        /// Ordered explanation phrases.
        explanation: Vec<String>,
    },
    /// Scoring failed; the fallback score and `error` verdict apply.
    Failed {
        /// Failure kind.
        kind: ScoringFailure,
        /// Score used in place of a combined score.
        fallback_score: f64,
        /// Explanation phrases.
        explanation: Vec<String>,
    },
}

impl ScoreOutcome {
    /// Combined score (fallback on failure).
    #[must_use]
    pub fn combined_score(&self) -> f64 {
        match self {
            Self::Scored { combined_score, .. } => *combined_score,
            Self::Failed { fallback_score, .. } => *fallback_score,
        }
    }

    /// Verdict (`error` on failure).
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Scored { verdict, .. } => *verdict,
            Self::Failed { .. } => Verdict::Error,
        }
    }

    /// Explanation phrases.
    #[must_use]
    pub fn explanation(&self) -> &[String] {
        match self {
            Self::Scored { explanation, .. } | Self::Failed { explanation, .. } => explanation,
        }
    }
}

/// Combines the two analyzers into one bounded score.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspicionScorer {
    quality: ImageQualityAnalyzer,
    text: TextPatternAnalyzer,
}

impl SuspicionScorer {
    /// Create a scorer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run both analyzers over the document and combine them.
    #[must_use]
    pub fn analyze(&self, content: &[u8], ocr_text: &str) -> AnalysisResult {
        let quality = self.quality.analyze_bytes(content);
        let text = self.text.analyze(ocr_text);
        let outcome = combine(&quality, &text);

        debug!(
            quality_score = quality.score(),
            text_score = text.score(),
            combined_score = outcome.combined_score(),
            verdict = ?outcome.verdict(),
            "Scoring complete"
        );

        AnalysisResult {
            quality,
            text,
            outcome,
        }
    }
}

/// Combine component analyses into a [`ScoreOutcome`].
#[must_use]
pub fn combine(quality: &QualityAnalysis, text: &TextAnalysis) -> ScoreOutcome {
    match combined_score(quality.score(), text.score()) {
        Some(score) => ScoreOutcome::Scored {
            combined_score: score,
            verdict: Verdict::from_score(score),
            explanation: build_explanation(quality, text),
        },
        None => {
            warn!(
                quality_score = quality.score(),
                text_score = text.score(),
                "Scoring failed: non-finite component score"
            );
            ScoreOutcome::Failed {
                kind: ScoringFailure::NonFiniteScore,
                fallback_score: ANALYSIS_FALLBACK_SCORE,
                explanation: vec![FAILED_EXPLANATION.to_string()],
            }
        },
    }
}

/// `round(q * 0.4 + t * 0.6, 2)` clamped to `[0, 1]`; `None` if not finite.
#[must_use]
pub fn combined_score(quality_score: f64, text_score: f64) -> Option<f64> {
    let raw = quality_score * QUALITY_WEIGHT + text_score * TEXT_WEIGHT;
    if !raw.is_finite() {
        return None;
    }
    Some(round2(raw).clamp(0.0, 1.0))
}

/// Round to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn build_explanation(quality: &QualityAnalysis, text: &TextAnalysis) -> Vec<String> {
    let issues: Vec<String> = quality
        .issues()
        .into_iter()
        .chain(text.issues())
        .map(str::to_string)
        .collect();

    if issues.is_empty() {
        vec![CLEAN_EXPLANATION.to_string()]
    } else {
        issues
    }
}
