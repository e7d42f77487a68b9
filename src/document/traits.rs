//! Collaborator traits
//!
//! Interfaces to the document viewer that the highlight core consumes.
//! Each trait is implemented by a backend (see `crate::backend`).

use async_trait::async_trait;

use super::error::Result;
use super::types::{Color, HighlightAnnotation, Quad, SearchHit, SearchOutcome, SearchRequest};

/// Extracts the words of a page in reading order
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Words of a page (1-indexed), in reading order
    async fn extract_page(&self, page_number: usize) -> Result<Vec<String>>;

    async fn page_count(&self) -> Result<usize>;
}

/// The page-scoped, single-result search primitive
///
/// Returns at most one match per call and never reports a phrase that is
/// split across pages. Implementations hold a single search cursor, so
/// callers must not issue concurrent requests (see `PageBoundedSearcher`).
#[async_trait]
pub trait SearchPrimitive: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome>;
}

/// Maps a character range of a page's text to geometry
#[async_trait]
pub trait TextPositionQuery: Send + Sync {
    /// Quads covering characters `[start, end)` of the page text, where the
    /// page text is the extracted words joined with single spaces
    async fn text_position(&self, page_number: usize, start: usize, end: usize)
        -> Result<Vec<Quad>>;
}

/// Owns highlight annotations on the displayed document
#[async_trait]
pub trait AnnotationRenderer: Send + Sync {
    /// Delete every annotation on the document
    async fn clear_all(&self) -> Result<()>;

    /// Add a highlight annotation
    async fn add_highlight(&self, annotation: &HighlightAnnotation) -> Result<()>;

    /// Redraw an annotation that was added
    async fn render(&self, annotation: &HighlightAnnotation) -> Result<()>;
}

/// Search-result display state of the viewer session
#[async_trait]
pub trait DocumentSession: Send + Sync {
    async fn clear_search_results(&self) -> Result<()>;

    /// Show hits as additional search results, drawn in `color`
    async fn display_search_results(&self, hits: &[SearchHit], color: Color) -> Result<()>;

    /// Make a hit the primary/active result (the viewer navigates to it)
    async fn set_active_search_result(&self, hit: &SearchHit) -> Result<()>;
}
