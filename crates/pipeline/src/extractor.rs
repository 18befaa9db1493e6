//! Document-to-text extraction.
//!
//! The PDF parser is an opaque capability: bytes go in, per-page text comes
//! out. Pages without a text layer (scanned images) yield an empty string
//! and never abort the extraction; deciding whether empty text is usable is
//! the document store's job.

use async_trait::async_trait;
use itzai_core::document::DocumentSource;
use itzai_core::error::ExtractError;
use tracing::debug;

/// Converts a document source into plain text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// A short name for logs (e.g. "pdf").
    fn name(&self) -> &str;

    /// Extract the full text of `source`, pages concatenated in order.
    async fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError>;
}

/// PDF extractor backed by the `pdf-extract` crate.
///
/// File reads go through `tokio::fs` and parsing runs on the blocking pool,
/// so a large upload in one session does not stall the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn read_bytes(source: &DocumentSource) -> Result<Vec<u8>, ExtractError> {
        let bytes = match source {
            DocumentSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                debug!(path = %path.display(), error = %e, "Document source unreadable");
                ExtractError::NotFound(source.descriptor())
            })?,
            DocumentSource::Upload { bytes, .. } => bytes.clone(),
        };

        if bytes.is_empty() {
            return Err(ExtractError::NotFound(source.descriptor()));
        }

        Ok(bytes)
    }

    /// Parse PDF bytes into per-page text, in page order.
    pub fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError> {
        let bytes = Self::read_bytes(source).await?;
        let size = bytes.len();

        // A panic inside the parser surfaces as a JoinError.
        let pages = tokio::task::spawn_blocking(move || Self::extract_pages(&bytes))
            .await
            .map_err(|e| ExtractError::ParseError(format!("PDF parser aborted: {e}")))??;

        debug!(
            source = %source.descriptor(),
            bytes = size,
            pages = pages.len(),
            "Extracted PDF text"
        );

        Ok(pages.concat())
    }
}
