//! Upload validation and text previews.

use std::path::Path;

use crate::config::VerifyConfig;
use crate::error::VerifyError;

/// Preview length in verification reports.
pub const OCR_PREVIEW_CHARS: usize = 200;
/// Preview length in document listings.
pub const LISTING_PREVIEW_CHARS: usize = 100;

/// Check the file name against the accepted extensions.
///
/// Returns the lowercase extension.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidUpload`] for an empty name, a missing
/// extension or one that is not accepted.
pub fn validate_filename(config: &VerifyConfig, filename: &str) -> Result<String, VerifyError> {
    if filename.trim().is_empty() {
        return Err(VerifyError::invalid_upload("no file selected"));
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            VerifyError::invalid_upload(format!("{} has no file extension", filename))
        })?;

    if !config.allows_extension(&ext) {
        return Err(VerifyError::invalid_upload(format!(
            "file type .{} not allowed (allowed: {})",
            ext,
            config.allowed_extensions.join(", ")
        )));
    }
    Ok(ext)
}

/// Check fetched content against the size limits.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidUpload`] for empty or oversized content.
pub fn validate_content(config: &VerifyConfig, content: &[u8]) -> Result<(), VerifyError> {
    if content.is_empty() {
        return Err(VerifyError::invalid_upload("file is empty"));
    }
    if content.len() > config.max_upload_bytes {
        return Err(VerifyError::invalid_upload(format!(
            "file is {} bytes, limit is {}",
            content.len(),
            config.max_upload_bytes
        )));
    }
    Ok(())
}

/// First `max_chars` characters, with `"..."` appended when cut.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
