//! Error types for the ItzAI domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type. Every error here is
//! recoverable at the session level and is surfaced to the user through its
//! `Display` text.

use thiserror::Error;

/// The top-level error type for all ItzAI operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned no usable text: {0}")]
    EmptyResponse(String),
}

/// Failures of the document-to-text extraction step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The source did not resolve to readable binary content.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The parser rejected the document.
    #[error("Could not read PDF: {0}")]
    ParseError(String),
}

/// Outcome of a failed `DocumentStore::load`. The slot is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Could not read PDF: {0}")]
    ParseError(String),

    /// Extraction succeeded but produced no text (e.g. scanned pages).
    #[error("No text could be extracted from {0}")]
    Empty(String),
}

impl From<ExtractError> for LoadError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NotFound(source) => LoadError::NotFound(source),
            ExtractError::ParseError(reason) => LoadError::ParseError(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// No clinical history is loaded, so nothing can ground an answer.
    #[error("No grounding documents: a clinical history must be loaded")]
    NoDocuments,
}

/// A failed completion request, with a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct QueryError {
    pub cause: String,
}

impl QueryError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

impl From<ProviderError> for QueryError {
    fn from(err: ProviderError) -> Self {
        Self::new(err.to_string())
    }
}

/// Why a query cycle settled without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("Error: no clinical history loaded. Load the patient history before asking.")]
    MissingPrimaryDocument,

    #[error("Error: the prompt could not be assembled ({0})")]
    AssemblyFailed(AssemblyError),

    #[error("Error in AI service: {0}")]
    QueryFailed(QueryError),
}
