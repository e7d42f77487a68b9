//! Span Highlighter
//!
//! Locates a data point's context text in a paginated document, even when
//! the context crosses page boundaries, and highlights the data point's
//! value inside it.
//!
//! # Modules
//!
//! - `document`: Core types, collaborator traits, errors and the page text cache
//! - `locate`: Page-bounded search, span location and line-merging geometry
//! - `highlight`: The highlight controller
//! - `backend`: Collaborator implementations (in-memory, MuPDF)
//! - `config`: Colors, timeouts and search limits

pub mod backend;
pub mod config;
pub mod document;
pub mod highlight;
pub mod locate;

pub use config::HighlightConfig;
pub use document::{DataPoint, HighlightError, Result};
pub use highlight::{Collaborators, HighlightController, HighlightOutcome};
