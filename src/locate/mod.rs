//! Span location and highlight geometry
//!
//! - `searcher`: page-bounded, single-result search with one outstanding
//!   request at a time
//! - `locator`: recursive divide-and-conquer location of spans that cross
//!   page boundaries
//! - `geometry`: merging glyph quads into per-line highlight bands

mod geometry;
mod locator;
mod searcher;

pub use geometry::{merge_quads_to_lines, merge_to_lines};
pub use locator::SpanLocator;
pub use searcher::PageBoundedSearcher;
