//! Highlight error types
//!
//! Unified error handling for span location, text extraction and rendering.

use thiserror::Error;

/// Unified highlight error type
#[derive(Debug, Error)]
pub enum HighlightError {
    /// A phrase matched by search could not be found in the page's extracted text
    #[error("Text not found in page. Text: {text}. Page: {page}")]
    InconsistentText { page: usize, text: String },

    /// A phrase fragment matched, but never where the rest of the span continues
    #[error("Ambiguous span on page {page}: {text}")]
    AmbiguousSpan { page: usize, text: String },

    /// A fragment that cannot be split further was not found
    #[error("Span not found: {0}")]
    SpanNotFound(String),

    /// Too many page-scoped searches for a single span
    #[error("Search budget of {0} searches exhausted")]
    SearchBudgetExhausted(usize),

    /// Text extraction error
    #[error("Text extraction error: {0}")]
    TextExtraction(String),

    /// Search error
    #[error("Search error: {0}")]
    Search(String),

    /// Text position lookup error
    #[error("Text position error: {0}")]
    TextPosition(String),

    /// Annotation rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Viewer session error
    #[error("Session error: {0}")]
    Session(String),

    /// Timeout error
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Malformed data point list
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed configuration value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Document backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for highlight operations
pub type Result<T> = std::result::Result<T, HighlightError>;

#[cfg(feature = "mupdf")]
impl From<mupdf::Error> for HighlightError {
    fn from(err: mupdf::Error) -> Self {
        HighlightError::Backend(err.to_string())
    }
}
