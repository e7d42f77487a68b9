//! In-memory document backend
//!
//! A paginated document held as plain text with synthetic monospace glyph
//! geometry. Implements every collaborator trait, so the highlight core can
//! run without a PDF engine (tests, benchmarks, previews).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::{
    AnnotationRenderer, Color, DocumentSession, HighlightAnnotation, HighlightError, Quad, Rect,
    Result, SearchHit, SearchOutcome, SearchPrimitive, SearchRequest, TextExtractor,
    TextPositionQuery,
};

/// Synthetic page layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphLayout {
    /// Advance of every glyph, spaces included
    pub glyph_width: f64,
    /// Distance between line tops
    pub line_height: f64,
    /// Height of a glyph box
    pub glyph_height: f64,
    /// Words laid out on each line before wrapping
    pub words_per_line: usize,
    /// Left and top page margin
    pub margin: f64,
}

impl Default for GlyphLayout {
    fn default() -> Self {
        Self {
            glyph_width: 6.0,
            line_height: 14.0,
            glyph_height: 12.0,
            words_per_line: 12,
            margin: 36.0,
        }
    }
}

struct MemoryPage {
    /// Words joined with single spaces
    text: String,
    /// One quad per character of `text`
    glyphs: Vec<Quad>,
}

impl MemoryPage {
    fn layout(raw: &str, layout: &GlyphLayout) -> Self {
        let words: Vec<&str> = raw.split_whitespace().collect();
        let per_line = layout.words_per_line.max(1);
        let mut glyphs = Vec::new();
        let mut x = layout.margin;

        for (i, word) in words.iter().enumerate() {
            let line = i / per_line;
            if i % per_line == 0 {
                x = layout.margin;
            }
            let top = layout.margin + line as f64 * layout.line_height;

            let mut glyph = |x: &mut f64| {
                let rect = Rect::new(*x, top, *x + layout.glyph_width, top + layout.glyph_height);
                glyphs.push(rect.to_quad());
                *x += layout.glyph_width;
            };

            for _ in word.chars() {
                glyph(&mut x);
            }
            // Separator stays at the end of the line it follows
            if i + 1 < words.len() {
                glyph(&mut x);
            }
        }

        Self {
            text: words.join(" "),
            glyphs,
        }
    }
}

#[derive(Default)]
struct SessionState {
    results: Vec<SearchHit>,
    result_color: Option<Color>,
    active: Option<SearchHit>,
}

#[derive(Default)]
struct AnnotationState {
    annotations: Vec<HighlightAnnotation>,
    rendered: Vec<String>,
}

/// A paginated in-memory document
pub struct MemoryDocument {
    id: String,
    pages: Vec<MemoryPage>,
    annotations: Mutex<AnnotationState>,
    session: Mutex<SessionState>,
    searches: AtomicUsize,
}

impl MemoryDocument {
    /// Create a document from page texts, in page order
    pub fn new<I, S>(id: &str, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_layout(id, pages, GlyphLayout::default())
    }

    pub fn with_layout<I, S>(id: &str, pages: I, layout: GlyphLayout) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.to_string(),
            pages: pages
                .into_iter()
                .map(|p| MemoryPage::layout(p.as_ref(), &layout))
                .collect(),
            annotations: Mutex::new(AnnotationState::default()),
            session: Mutex::new(SessionState::default()),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Normalized text of a page (1-indexed)
    pub fn page_text(&self, page_number: usize) -> Option<&str> {
        self.page(page_number).map(|p| p.text.as_str())
    }

    /// Annotations currently on the document
    pub fn annotations(&self) -> Vec<HighlightAnnotation> {
        self.annotations.lock().annotations.clone()
    }

    /// Ids of annotations that were rendered
    pub fn rendered(&self) -> Vec<String> {
        self.annotations.lock().rendered.clone()
    }

    pub fn search_results(&self) -> Vec<SearchHit> {
        self.session.lock().results.clone()
    }

    /// Color the current search results are drawn in
    pub fn search_result_color(&self) -> Option<Color> {
        self.session.lock().result_color
    }

    pub fn active_result(&self) -> Option<SearchHit> {
        self.session.lock().active.clone()
    }

    /// Searches answered so far
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    fn page(&self, page_number: usize) -> Option<&MemoryPage> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
    }
}

#[async_trait]
impl TextExtractor for MemoryDocument {
    async fn extract_page(&self, page_number: usize) -> Result<Vec<String>> {
        let page = self.page(page_number).ok_or_else(|| {
            HighlightError::TextExtraction(format!(
                "Page {} not found (document has {} pages)",
                page_number,
                self.pages.len()
            ))
        })?;
        Ok(page.text.split(' ').filter(|w| !w.is_empty()).map(String::from).collect())
    }

    async fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }
}

#[async_trait]
impl SearchPrimitive for MemoryDocument {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        if request.phrase.is_empty() {
            return Err(HighlightError::Search("Empty search phrase".to_string()));
        }

        let first = request.range.start.unwrap_or(1).max(1);
        let last = request.range.end.unwrap_or(self.pages.len()).min(self.pages.len());

        for page_number in first..=last {
            let Some(page) = self.page(page_number) else {
                continue;
            };
            if let Some(byte) = page.text.find(&request.phrase) {
                let start = page.text[..byte].chars().count();
                let end = start + request.phrase.chars().count();
                return Ok(SearchOutcome::Result(SearchHit::found(
                    page_number,
                    &request.phrase,
                    page.glyphs[start..end].to_vec(),
                )));
            }
        }

        Ok(SearchOutcome::DocumentEnd)
    }
}

#[async_trait]
impl TextPositionQuery for MemoryDocument {
    async fn text_position(
        &self,
        page_number: usize,
        start: usize,
        end: usize,
    ) -> Result<Vec<Quad>> {
        let page = self.page(page_number).ok_or_else(|| {
            HighlightError::TextPosition(format!("Page {} not found", page_number))
        })?;
        if start > end || end > page.glyphs.len() {
            return Err(HighlightError::TextPosition(format!(
                "Range {}..{} outside page {} ({} characters)",
                start,
                end,
                page_number,
                page.glyphs.len()
            )));
        }
        Ok(page.glyphs[start..end].to_vec())
    }
}

#[async_trait]
impl AnnotationRenderer for MemoryDocument {
    async fn clear_all(&self) -> Result<()> {
        let mut state = self.annotations.lock();
        state.annotations.clear();
        state.rendered.clear();
        Ok(())
    }

    async fn add_highlight(&self, annotation: &HighlightAnnotation) -> Result<()> {
        if self.page(annotation.page_number).is_none() {
            return Err(HighlightError::Render(format!(
                "Page {} not found",
                annotation.page_number
            )));
        }
        self.annotations.lock().annotations.push(annotation.clone());
        Ok(())
    }

    async fn render(&self, annotation: &HighlightAnnotation) -> Result<()> {
        let mut state = self.annotations.lock();
        if !state.annotations.iter().any(|a| a.id == annotation.id) {
            return Err(HighlightError::Render(format!(
                "Annotation {} was not added",
                annotation.id
            )));
        }
        state.rendered.push(annotation.id.clone());
        Ok(())
    }
}

#[async_trait]
impl DocumentSession for MemoryDocument {
    async fn clear_search_results(&self) -> Result<()> {
        let mut session = self.session.lock();
        session.results.clear();
        session.result_color = None;
        session.active = None;
        Ok(())
    }

    async fn display_search_results(&self, hits: &[SearchHit], color: Color) -> Result<()> {
        let mut session = self.session.lock();
        session.results.extend_from_slice(hits);
        session.result_color = Some(color);
        Ok(())
    }

    async fn set_active_search_result(&self, hit: &SearchHit) -> Result<()> {
        let mut session = self.session.lock();
        if !session.results.contains(hit) {
            return Err(HighlightError::Session(format!(
                "Result on page {} is not displayed",
                hit.page_number
            )));
        }
        session.active = Some(hit.clone());
        Ok(())
    }
}
