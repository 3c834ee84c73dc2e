//! Image quality analysis.
//!
//! Three independent statistics over the grayscale image feed the quality
//! component of the suspicion score:
//!
//! | Signal | Metric | Flag |
//! |---|---|---|
//! | Blur | Laplacian response variance | `< 100` |
//! | Brightness | Mean intensity | `< 50` dark, `> 200` bright |
//! | Contrast | Intensity standard deviation | `< 30` |
//!
//! An image that cannot be decoded is not an error: it scores the fixed
//! fallback so the document leans toward suspicion.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Laplacian variance below this = blurry.
pub const BLUR_THRESHOLD: f64 = 100.0;
/// Mean intensity below this = too dark.
pub const DARK_THRESHOLD: f64 = 50.0;
/// Mean intensity above this = too bright.
pub const BRIGHT_THRESHOLD: f64 = 200.0;
/// Standard deviation below this = low contrast.
pub const CONTRAST_THRESHOLD: f64 = 30.0;

/// Score assigned when the image cannot be analyzed.
pub const QUALITY_FALLBACK_SCORE: f64 = 0.8;

// Weights in hundredths so sums stay exact.
const BLUR_WEIGHT: u32 = 30;
const LIGHTING_WEIGHT: u32 = 20;
const CONTRAST_WEIGHT: u32 = 20;

/// Raw image statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Variance of the Laplacian response (higher = sharper).
    pub blur_variance: f64,
    /// Mean pixel intensity (0-255).
    pub brightness: f64,
    /// Standard deviation of pixel intensity.
    pub contrast: f64,
}

/// Issue flags derived from [`QualityMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlags {
    /// Laplacian variance under [`BLUR_THRESHOLD`].
    pub blurry: bool,
    /// Mean under [`DARK_THRESHOLD`].
    pub too_dark: bool,
    /// Mean over [`BRIGHT_THRESHOLD`].
    pub too_bright: bool,
    /// Standard deviation under [`CONTRAST_THRESHOLD`].
    pub low_contrast: bool,
}

impl QualityFlags {
    /// Derive flags from metrics.
    #[must_use]
    pub fn from_metrics(metrics: &QualityMetrics) -> Self {
        Self {
            blurry: metrics.blur_variance < BLUR_THRESHOLD,
            too_dark: metrics.brightness < DARK_THRESHOLD,
            too_bright: metrics.brightness > BRIGHT_THRESHOLD,
            low_contrast: metrics.contrast < CONTRAST_THRESHOLD,
        }
    }

    /// Lighting is off in either direction.
    #[must_use]
    pub fn poor_lighting(&self) -> bool {
        self.too_dark || self.too_bright
    }

    /// Weighted quality score, capped at 1.0.
    #[must_use]
    pub fn score(&self) -> f64 {
        let mut hundredths = 0u32;
        if self.blurry {
            hundredths += BLUR_WEIGHT;
        }
        if self.poor_lighting() {
            hundredths += LIGHTING_WEIGHT;
        }
        if self.low_contrast {
            hundredths += CONTRAST_WEIGHT;
        }
        f64::from(hundredths.min(100)) / 100.0
    }

    /// Human-readable issues, in reporting order.
    #[must_use]
    pub fn issues(&self) -> Vec<&'static str> {
        let mut issues = Vec::new();
        if self.blurry {
            issues.push("Document appears blurry or low quality");
        }
        if self.poor_lighting() {
            issues.push("Poor lighting detected");
        }
        if self.low_contrast {
            issues.push("Low contrast detected");
        }
        issues
    }
}

/// Why an image could not be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFailure {
    /// Bytes are not a decodable raster image (includes PDFs).
    ImageDecode,
    /// Image decoded to zero pixels.
    EmptyImage,
}

impl QualityFailure {
    /// Human-readable issue for explanations.
    #[must_use]
    pub fn issue(&self) -> &'static str {
        match self {
            Self::ImageDecode => "Image could not be decoded",
            Self::EmptyImage => "Image contains no pixels",
        }
    }
}

/// Outcome of image quality analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QualityAnalysis {
    /// Image was measured.
    Measured {
        /// Raw statistics.
        metrics: QualityMetrics,
        /// Derived issue flags.
        flags: QualityFlags,
        /// Weighted score in `[0, 1]`.
        quality_score: f64,
    },
    /// Image could not be measured; the fallback score applies.
    Failed {
        /// Failure kind.
        kind: QualityFailure,
        /// Score used in place of a measurement.
        fallback_score: f64,
        /// Underlying error message.
        message: String,
    },
}

impl QualityAnalysis {
    /// Score contributed to the combined suspicion score.
    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Measured { quality_score, .. } => *quality_score,
            Self::Failed { fallback_score, .. } => *fallback_score,
        }
    }

    /// Human-readable issues, in reporting order.
    #[must_use]
    pub fn issues(&self) -> Vec<&'static str> {
        match self {
            Self::Measured { flags, .. } => flags.issues(),
            Self::Failed { kind, .. } => vec![kind.issue()],
        }
    }

    /// Flags, if the image was measured.
    #[must_use]
    pub fn flags(&self) -> Option<&QualityFlags> {
        match self {
            Self::Measured { flags, .. } => Some(flags),
            Self::Failed { .. } => None,
        }
    }

    fn failed(kind: QualityFailure, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            fallback_score: QUALITY_FALLBACK_SCORE,
            message: message.into(),
        }
    }
}

/// Statistical image quality analyzer. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageQualityAnalyzer;

impl ImageQualityAnalyzer {
    /// Create an analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode raw document bytes and analyze them.
    #[must_use]
    pub fn analyze_bytes(&self, bytes: &[u8]) -> QualityAnalysis {
        match image::load_from_memory(bytes) {
            Ok(img) => self.analyze_gray(&img.to_luma8()),
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "Quality: image decode failed");
                QualityAnalysis::failed(QualityFailure::ImageDecode, e.to_string())
            },
        }
    }

    /// Analyze an already-decoded grayscale image.
    #[must_use]
    pub fn analyze_gray(&self, gray: &GrayImage) -> QualityAnalysis {
        if gray.width() == 0 || gray.height() == 0 {
            return QualityAnalysis::failed(QualityFailure::EmptyImage, "zero-sized image");
        }

        let (brightness, contrast) = mean_and_stddev(gray);
        let metrics = QualityMetrics {
            blur_variance: laplacian_variance(gray),
            brightness,
            contrast,
        };
        let flags = QualityFlags::from_metrics(&metrics);

        debug!(
            blur_variance = metrics.blur_variance,
            brightness = metrics.brightness,
            contrast = metrics.contrast,
            "Quality: measured"
        );

        QualityAnalysis::Measured {
            metrics,
            flags,
            quality_score: flags.score(),
        }
    }
}

/// Variance of the 4-neighbour Laplacian over every pixel.
///
/// Kernel `[0,1,0; 1,-4,1; 0,1,0]`; borders mirror without repeating the
/// edge pixel.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let px = |x: i64, y: i64| -> f64 {
        let xr = reflect101(x, w) as u32;
        let yr = reflect101(y, h) as u32;
        f64::from(img.get_pixel(xr, yr).0[0])
    };

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let count = (w * h) as f64;
    let mean = sum / count;
    ((sum_sq / count) - mean * mean).max(0.0)
}

/// Mean and population standard deviation of pixel intensity.
pub fn mean_and_stddev(img: &GrayImage) -> (f64, f64) {
    let count = (img.width() as usize) * (img.height() as usize);
    if count == 0 {
        return (0.0, 0.0);
    }

    let (sum, sum_sq) = img.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = f64::from(p.0[0]);
        (s + v, sq + v * v)
    });
    let n = count as f64;
    let mean = sum / n;
    let variance = ((sum_sq / n) - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

fn reflect101(i: i64, n: i64) -> i64 {
    if n == 1 {
        return 0;
    }
    if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    }
}
