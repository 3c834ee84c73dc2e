//! Extracted-text pattern analysis.
//!
//! Scores OCR output for the lexical shape of a genuine certificate:
//! domain vocabulary present, plausible years present, and none of the
//! character runs typical of pasted or garbled text.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum trimmed length (characters) for analysis.
pub const MIN_TEXT_CHARS: usize = 10;

/// Score assigned when there is too little text to analyze.
pub const TEXT_FALLBACK_SCORE: f64 = 0.8;

/// Minimum vocabulary hits for `has_keywords`.
pub const MIN_KEYWORD_MATCHES: usize = 2;

/// Prefix OCR collaborators use to tag a failed extraction.
pub const OCR_ERROR_PREFIX: &str = "ERROR:";

/// Certificate vocabulary, matched case-insensitively as substrings.
pub const CERTIFICATE_KEYWORDS: &[&str] = &[
    "certificate",
    "diploma",
    "degree",
    "university",
    "college",
    "awarded",
    "completed",
    "graduated",
    "issued",
    "authorized",
];

// Weights in hundredths so sums stay exact.
const MISSING_KEYWORDS_WEIGHT: u32 = 40;
const SUSPICIOUS_TEXT_WEIGHT: u32 = 30;
const NO_DATES_WEIGHT: u32 = 20;

static TEXT_PATTERNS: OnceLock<TextPatternSet> = OnceLock::new();

/// Pre-compiled pattern set.
#[derive(Debug)]
struct TextPatternSet {
    suspicious: [Regex; 3],
    year: Regex,
}

impl TextPatternSet {
    fn new() -> Self {
        Self {
            suspicious: [
                // Long run of capitals
                Regex::new(r"\b[A-Z]{10,}\b").expect("capitals regex must compile"),
                // Card-number-like digit groups
                Regex::new(r"\d{4}-\d{4}-\d{4}").expect("digit group regex must compile"),
                // Run of symbols
                Regex::new(r"[^\w\s]{5,}").expect("symbol run regex must compile"),
            ],
            year: Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex must compile"),
        }
    }
}

fn patterns() -> &'static TextPatternSet {
    TEXT_PATTERNS.get_or_init(TextPatternSet::new)
}

/// Issue flags from text analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFlags {
    /// Fewer than [`MIN_KEYWORD_MATCHES`] vocabulary hits.
    pub missing_keywords: bool,
    /// At least one suspicious pattern matched.
    pub suspicious_text: bool,
    /// No year between 1900 and 2099.
    pub no_dates: bool,
}

impl TextFlags {
    /// Weighted text score, capped at 1.0.
    #[must_use]
    pub fn score(&self) -> f64 {
        let mut hundredths = 0u32;
        if self.missing_keywords {
            hundredths += MISSING_KEYWORDS_WEIGHT;
        }
        if self.suspicious_text {
            hundredths += SUSPICIOUS_TEXT_WEIGHT;
        }
        if self.no_dates {
            hundredths += NO_DATES_WEIGHT;
        }
        f64::from(hundredths.min(100)) / 100.0
    }

    /// Human-readable issues, in reporting order.
    #[must_use]
    pub fn issues(&self) -> Vec<&'static str> {
        let mut issues = Vec::new();
        if self.missing_keywords {
            issues.push("Missing expected certificate keywords");
        }
        if self.suspicious_text {
            issues.push("Suspicious text patterns detected");
        }
        if self.no_dates {
            issues.push("No valid dates found");
        }
        issues
    }
}

/// Why text was not analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientReason {
    /// Fewer than [`MIN_TEXT_CHARS`] characters after trimming.
    TooShort,
    /// The OCR collaborator reported a failure.
    ExtractionFailed,
}

/// Outcome of text pattern analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TextAnalysis {
    /// Text was analyzed.
    Analyzed {
        /// Vocabulary hits (each keyword counted once).
        keyword_matches: usize,
        /// Distinct suspicious patterns that matched (0-3).
        suspicious_patterns: usize,
        /// Year tokens found.
        dates_found: usize,
        /// Derived issue flags.
        flags: TextFlags,
        /// Weighted score in `[0, 1]`.
        text_score: f64,
    },
    /// Not enough usable text; the fallback score applies.
    Insufficient {
        /// Why the text was unusable.
        reason: InsufficientReason,
        /// Trimmed length in characters.
        length: usize,
        /// Score used in place of an analysis.
        fallback_score: f64,
    },
}

impl TextAnalysis {
    /// Score contributed to the combined suspicion score.
    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Analyzed { text_score, .. } => *text_score,
            Self::Insufficient { fallback_score, .. } => *fallback_score,
        }
    }

    /// Human-readable issues, in reporting order.
    #[must_use]
    pub fn issues(&self) -> Vec<&'static str> {
        match self {
            Self::Analyzed { flags, .. } => flags.issues(),
            Self::Insufficient { .. } => vec!["Insufficient text extracted"],
        }
    }

    /// Flags, if the text was analyzed.
    #[must_use]
    pub fn flags(&self) -> Option<&TextFlags> {
        match self {
            Self::Analyzed { flags, .. } => Some(flags),
            Self::Insufficient { .. } => None,
        }
    }
}

/// Lexical analyzer for extracted text. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPatternAnalyzer;

impl TextPatternAnalyzer {
    /// Create an analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze extracted text.
    #[must_use]
    pub fn analyze(&self, text: &str) -> TextAnalysis {
        let trimmed = text.trim();
        let length = trimmed.chars().count();

        if trimmed.starts_with(OCR_ERROR_PREFIX) {
            return TextAnalysis::Insufficient {
                reason: InsufficientReason::ExtractionFailed,
                length,
                fallback_score: TEXT_FALLBACK_SCORE,
            };
        }
        if length < MIN_TEXT_CHARS {
            return TextAnalysis::Insufficient {
                reason: InsufficientReason::TooShort,
                length,
                fallback_score: TEXT_FALLBACK_SCORE,
            };
        }

        let keyword_matches = count_keywords(text);
        let suspicious_patterns = count_suspicious_patterns(text);
        let dates_found = patterns().year.find_iter(text).count();

        let flags = TextFlags {
            missing_keywords: keyword_matches < MIN_KEYWORD_MATCHES,
            suspicious_text: suspicious_patterns > 0,
            no_dates: dates_found == 0,
        };

        TextAnalysis::Analyzed {
            keyword_matches,
            suspicious_patterns,
            dates_found,
            flags,
            text_score: flags.score(),
        }
    }
}

/// Count vocabulary words present in `text` (case-insensitive substring).
pub fn count_keywords(text: &str) -> usize {
    let lower = text.to_lowercase();
    CERTIFICATE_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
}

/// Count distinct suspicious patterns present in `text`.
pub fn count_suspicious_patterns(text: &str) -> usize {
    patterns()
        .suspicious
        .iter()
        .filter(|re| re.is_match(text))
        .count()
}
