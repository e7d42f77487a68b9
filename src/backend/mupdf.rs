//! MuPDF document backend
//!
//! Builds page text and glyph geometry from MuPDF structured text:
//! - Words are runs of non-whitespace characters, joined with single spaces
//! - Each character of the page text maps to the quad of its glyph
//!   (separators have none)
//!
//! MuPDF's fz_context is not thread-safe, so every page is loaded on a
//! blocking thread from a fresh document instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mupdf::{Document, TextPageOptions};
use parking_lot::Mutex;

use crate::document::{
    HighlightError, Quad, Result, SearchHit, SearchOutcome, SearchPrimitive, SearchRequest,
    TextExtractor, TextPositionQuery,
};

/// Text and per-character geometry of one page
struct PageGlyphs {
    text: String,
    glyphs: Vec<Option<Quad>>,
}

#[derive(Default)]
struct GlyphBuilder {
    text: String,
    glyphs: Vec<Option<Quad>>,
    in_word: bool,
}

impl GlyphBuilder {
    fn push(&mut self, c: char, quad: Quad) {
        if c.is_whitespace() {
            self.break_word();
            return;
        }
        if !self.in_word && !self.text.is_empty() {
            self.text.push(' ');
            self.glyphs.push(None);
        }
        self.text.push(c);
        self.glyphs.push(Some(quad));
        self.in_word = true;
    }

    fn break_word(&mut self) {
        self.in_word = false;
    }

    fn finish(self) -> PageGlyphs {
        PageGlyphs {
            text: self.text,
            glyphs: self.glyphs,
        }
    }
}

/// A PDF opened with MuPDF
pub struct MuPdfDocument {
    /// The document data, reopened for each page load
    data: Arc<Vec<u8>>,
    id: String,
    page_count: usize,
    glyph_cache: Mutex<HashMap<usize, Arc<PageGlyphs>>>,
}

impl MuPdfDocument {
    pub fn from_bytes(data: &[u8], id: &str) -> Result<Self> {
        // Validate the document can be opened
        let doc = Document::from_bytes(data, "application/pdf")?;
        let page_count = doc.page_count()? as usize;

        Ok(Self {
            data: Arc::new(data.to_vec()),
            id: id.to_string(),
            page_count,
            glyph_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, id: &str) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            HighlightError::Backend(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(&data, id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    async fn page_glyphs(&self, page_number: usize) -> Result<Arc<PageGlyphs>> {
        if let Some(glyphs) = self.glyph_cache.lock().get(&page_number).cloned() {
            return Ok(glyphs);
        }
        if page_number == 0 || page_number > self.page_count {
            return Err(HighlightError::TextExtraction(format!(
                "Page {} not found (document has {} pages)",
                page_number, self.page_count
            )));
        }

        let data = self.data.clone();
        let glyphs = tokio::task::spawn_blocking(move || load_page_glyphs(&data, page_number))
            .await
            .map_err(|e| HighlightError::Backend(format!("Page load task failed: {}", e)))??;

        let glyphs = Arc::new(glyphs);
        self.glyph_cache.lock().insert(page_number, glyphs.clone());
        Ok(glyphs)
    }
}

fn load_page_glyphs(data: &[u8], page_number: usize) -> Result<PageGlyphs> {
    let doc = Document::from_bytes(data, "application/pdf")?;
    let page = doc.load_page((page_number - 1) as i32)?;
    let text_page = page.to_text_page(TextPageOptions::empty())?;

    let mut builder = GlyphBuilder::default();
    for block in text_page.blocks() {
        for line in block.lines() {
            for ch in line.chars() {
                let Some(c) = ch.char() else {
                    continue;
                };
                let q = ch.quad();
                builder.push(
                    c,
                    Quad::new(
                        q.ll.x as f64,
                        q.ll.y as f64,
                        q.lr.x as f64,
                        q.lr.y as f64,
                        q.ur.x as f64,
                        q.ur.y as f64,
                        q.ul.x as f64,
                        q.ul.y as f64,
                    ),
                );
            }
            builder.break_word();
        }
    }

    Ok(builder.finish())
}

#[async_trait]
impl TextExtractor for MuPdfDocument {
    async fn extract_page(&self, page_number: usize) -> Result<Vec<String>> {
        let page = self.page_glyphs(page_number).await?;
        Ok(page.text.split(' ').filter(|w| !w.is_empty()).map(String::from).collect())
    }

    async fn page_count(&self) -> Result<usize> {
        Ok(self.page_count)
    }
}

#[async_trait]
impl SearchPrimitive for MuPdfDocument {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        if request.phrase.is_empty() {
            return Err(HighlightError::Search("Empty search phrase".to_string()));
        }
        let first = request.range.start.unwrap_or(1).max(1);
        let last = request.range.end.unwrap_or(self.page_count).min(self.page_count);

        for page_number in first..=last {
            let page = self.page_glyphs(page_number).await?;
            if let Some(byte) = page.text.find(&request.phrase) {
                let start = page.text[..byte].chars().count();
                let end = start + request.phrase.chars().count();
                let quads = page.glyphs[start..end].iter().flatten().copied().collect();
                return Ok(SearchOutcome::Result(SearchHit::found(
                    page_number,
                    &request.phrase,
                    quads,
                )));
            }
        }

        Ok(SearchOutcome::DocumentEnd)
    }
}

#[async_trait]
impl TextPositionQuery for MuPdfDocument {
    async fn text_position(
        &self,
        page_number: usize,
        start: usize,
        end: usize,
    ) -> Result<Vec<Quad>> {
        let page = self.page_glyphs(page_number).await?;
        if start > end || end > page.glyphs.len() {
            return Err(HighlightError::TextPosition(format!(
                "Range {}..{} outside page {} ({} characters)",
                start,
                end,
                page_number,
                page.glyphs.len()
            )));
        }
        Ok(page.glyphs[start..end].iter().flatten().copied().collect())
    }
}
