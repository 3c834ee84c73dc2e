//! Text extraction collaborators.
//!
//! Extraction failures never abort a verification: the engine turns them
//! into an `ERROR:`-tagged string, which text analysis treats as
//! insufficient text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::text::OCR_ERROR_PREFIX;

/// Extracts plain text from document bytes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from `content`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::OcrError`] if extraction fails.
    async fn extract(&self, content: &[u8]) -> Result<String, VerifyError>;

    /// Name recorded with the extracted text.
    fn method(&self) -> &'static str;
}

/// Run `extractor`, folding failure into an error-tagged string.
pub async fn extract_or_tag(extractor: &dyn TextExtractor, content: &[u8]) -> String {
    match extractor.extract(content).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(method = extractor.method(), error = %e, "OCR: extraction failed");
            format!("{} {}", OCR_ERROR_PREFIX, e)
        },
    }
}

/// Runs the `tesseract` executable, piping the document through stdin.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    command: String,
    timeout: Duration,
}

impl TesseractExtractor {
    /// Extractor invoking `command` with a per-document timeout.
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

fn ocr_error(message: impl Into<String>) -> VerifyError {
    VerifyError::OcrError {
        message: message.into(),
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, content: &[u8]) -> Result<String, VerifyError> {
        if content.starts_with(b"%PDF") {
            return Err(ocr_error("PDF input requires page rasterization"));
        }

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "--psm", "6"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ocr_error(format!("failed to start {}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ocr_error("child stdin unavailable"))?;
        let input = content.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ocr_error(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| ocr_error(format!("wait failed: {}", e)))?;

        if let Ok(Err(e)) = writer.await {
            debug!(error = %e, "OCR: stdin write ended early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ocr_error(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.chars().count(), "OCR: extraction complete");
        Ok(text)
    }

    fn method(&self) -> &'static str {
        "tesseract_ocr"
    }
}

/// Returns a fixed text for every document.
///
/// Used when the text is already known, such as `certverify analyze --text`.
#[derive(Debug, Clone, Default)]
pub struct StaticTextExtractor {
    text: String,
}

impl StaticTextExtractor {
    /// Extractor that always yields `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TextExtractor for StaticTextExtractor {
    async fn extract(&self, _content: &[u8]) -> Result<String, VerifyError> {
        Ok(self.text.clone())
    }

    fn method(&self) -> &'static str {
        "provided_text"
    }
}
