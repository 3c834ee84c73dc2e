//! Content sources: where document bytes come from.
//!
//! A reference is either a local path or an `http(s)://` URL. Any failure
//! to produce bytes is [`VerifyError::SourceUnavailable`], the only error
//! that aborts a verification. Remote bodies larger than the upload limit
//! are refused as [`VerifyError::InvalidUpload`] before they are buffered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, info, warn};

use crate::error::VerifyError;

/// Produces raw document bytes for a reference.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the full content behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SourceUnavailable`] if the content cannot be read.
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, VerifyError>;
}

fn unavailable(reference: &str, message: impl Into<String>) -> VerifyError {
    VerifyError::SourceUnavailable {
        reference: reference.to_string(),
        message: message.into(),
    }
}

/// Reads local files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl ContentSource for FsSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, VerifyError> {
        let bytes = tokio::fs::read(reference).await.map_err(|e| {
            warn!(path = %reference, error = %e, "Source: file read failed");
            unavailable(reference, e.to_string())
        })?;
        debug!(path = %reference, len = bytes.len(), "Source: file read");
        Ok(bytes)
    }
}

/// Fetches `http(s)://` URLs.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    max_bytes: usize,
}

impl HttpSource {
    /// Build a client with the given total request timeout, reading at most
    /// `max_bytes` of any response body.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConfigError`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, VerifyError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_idle_timeout(Duration::from_secs(5))
            .user_agent(format!("certverify/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VerifyError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, max_bytes })
    }

    fn too_large(&self, reference: &str, len: u64) -> VerifyError {
        warn!(url = %reference, len = len, limit = self.max_bytes, "Source: body over limit");
        VerifyError::invalid_upload(format!(
            "file is at least {} bytes, limit is {}",
            len, self.max_bytes
        ))
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, VerifyError> {
        info!(url = %reference, "Source: fetching document");

        let mut response = self.client.get(reference).send().await.map_err(|e| {
            warn!(url = %reference, error = %e, "Source: request failed");
            unavailable(reference, format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %reference, status = %status, "Source: non-success status");
            return Err(unavailable(reference, format!("HTTP error: {}", status)));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(self.too_large(reference, len));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unavailable(reference, format!("Failed to read body: {}", e)))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(reference, (bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!(url = %reference, len = bytes.len(), "Source: body received");
        Ok(bytes)
    }
}

/// Dispatches on the reference: URLs over HTTP, everything else from disk.
#[derive(Debug, Clone)]
pub struct ReferenceSource {
    fs: FsSource,
    http: HttpSource,
}

impl ReferenceSource {
    /// Build with the given HTTP timeout and remote body limit.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConfigError`] if the HTTP client cannot be built.
    pub fn new(fetch_timeout: Duration, max_bytes: usize) -> Result<Self, VerifyError> {
        Ok(Self {
            fs: FsSource,
            http: HttpSource::new(fetch_timeout, max_bytes)?,
        })
    }
}

/// Check whether a reference names a remote URL.
#[must_use]
pub fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl ContentSource for ReferenceSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, VerifyError> {
        if reference.trim().is_empty() {
            return Err(unavailable(reference, "empty reference"));
        }
        if is_remote(reference) {
            self.http.fetch(reference).await
        } else {
            self.fs.fetch(reference).await
        }
    }
}
