//! Document abstraction for span highlighting
//!
//! Types, errors and collaborator interfaces shared by the span locator and
//! the highlight controller, plus the page text cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   HighlightController                    │
//! │      (clears, locates, offsets the value, renders)       │
//! └──────────────────────────────────────────────────────────┘
//!            │                               │
//!            ▼                               ▼
//!   ┌──────────────────┐          ┌──────────────────────┐
//!   │   SpanLocator    │          │  merge_to_lines      │
//!   └──────────────────┘          └──────────────────────┘
//!       │          │
//!       ▼          ▼
//!   ┌────────────┐ ┌────────────────────────┐
//!   │ PageText   │ │ PageBoundedSearcher    │
//!   │ Cache      │ │ (single search cursor) │
//!   └────────────┘ └────────────────────────┘
//!       │                    │
//!       ▼                    ▼
//!   TextExtractor      SearchPrimitive      (backend collaborators)
//! ```

mod cache;
mod error;
mod traits;
mod types;

pub use cache::{CacheStats, PageTextCache};
pub use error::{HighlightError, Result};
pub use traits::{
    AnnotationRenderer, DocumentSession, SearchPrimitive, TextExtractor, TextPositionQuery,
};
pub use types::{
    Color, DataPoint, HighlightAnnotation, PageRange, Point, Quad, Rect, ResultCode, SearchHit,
    SearchMode, SearchOutcome, SearchRequest,
};
