//! Configuration for the verification engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::VerifyError;

/// File extensions accepted for upload.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "pdf", "tiff", "bmp"];

/// Configuration for certverify.
///
/// Built once at process start and handed to
/// [`VerificationEngine::with_config`](crate::engine::VerificationEngine::with_config).
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Directory for persisted documents and identities (memory only if `None`).
    pub data_dir: Option<PathBuf>,
    /// Timeout for fetching document content over HTTP(S).
    pub fetch_timeout: Duration,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
    /// Accepted file extensions (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
    /// OCR executable invoked as `<cmd> stdin stdout`.
    pub ocr_command: String,
    /// OCR process timeout.
    pub ocr_timeout: Duration,
    /// Hashing secret for uploads that name no institute.
    pub fallback_secret: Option<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            fetch_timeout: Duration::from_secs(30),
            max_upload_bytes: 20 * 1024 * 1024, // 20 MB
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            ocr_command: "tesseract".into(),
            ocr_timeout: Duration::from_secs(60),
            fallback_secret: None,
        }
    }
}

impl VerifyConfig {
    /// Defaults overlaid with `CERTVERIFY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConfigError`] if a numeric variable is malformed.
    pub fn from_env() -> Result<Self, VerifyError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VerifyError> {
        let mut config = Self::default();

        if let Some(dir) = lookup("CERTVERIFY_DATA_DIR").filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("CERTVERIFY_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(parse_number(
                "CERTVERIFY_FETCH_TIMEOUT_SECS",
                &secs,
            )?);
        }
        if let Some(bytes) = lookup("CERTVERIFY_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes =
                parse_number("CERTVERIFY_MAX_UPLOAD_BYTES", &bytes)? as usize;
        }
        if let Some(cmd) = lookup("CERTVERIFY_OCR_COMMAND").filter(|c| !c.is_empty()) {
            config.ocr_command = cmd;
        }
        if let Some(secret) = lookup("CERTVERIFY_FALLBACK_SECRET").filter(|s| !s.is_empty()) {
            config.fallback_secret = Some(secret);
        }

        Ok(config)
    }

    /// Check whether a lowercase extension is accepted.
    #[must_use]
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64, VerifyError> {
    value.trim().parse().map_err(|e| VerifyError::ConfigError {
        message: format!("{} must be a non-negative integer, got {:?}: {}", name, value, e),
    })
}
