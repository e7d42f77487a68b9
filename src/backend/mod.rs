//! Document backends implementing the collaborator traits
//!
//! - `memory`: plain-text pages with synthetic glyph geometry
//! - `mupdf`: PDF text and glyph quads via MuPDF (feature `mupdf`)

pub mod memory;

#[cfg(feature = "mupdf")]
pub mod mupdf;

pub use memory::{GlyphLayout, MemoryDocument};

#[cfg(feature = "mupdf")]
pub use self::mupdf::MuPdfDocument;
