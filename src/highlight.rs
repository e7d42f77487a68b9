//! Highlight controller
//!
//! Orchestrates one highlight: clear existing annotations, locate the data
//! point's context, offset the value inside the located context on the
//! primary page, fetch its quads, merge them into line bands and render.
//!
//! Every call stamps a generation token. Search result display and
//! annotation mutation only happen while the token is still current, so a
//! newer `highlight` (or `clear`) supersedes one that is still in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::HighlightConfig;
use crate::document::{
    AnnotationRenderer, CacheStats, DataPoint, DocumentSession, HighlightAnnotation,
    HighlightError, PageTextCache, Result, SearchPrimitive, TextExtractor, TextPositionQuery,
};
use crate::locate::{merge_quads_to_lines, PageBoundedSearcher, SpanLocator};

/// Collaborators the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub search: Arc<dyn SearchPrimitive>,
    pub positions: Arc<dyn TextPositionQuery>,
    pub renderer: Arc<dyn AnnotationRenderer>,
    pub session: Arc<dyn DocumentSession>,
}

impl Collaborators {
    /// Use one document for every collaborator
    pub fn from_document<D>(document: Arc<D>) -> Self
    where
        D: TextExtractor
            + SearchPrimitive
            + TextPositionQuery
            + AnnotationRenderer
            + DocumentSession
            + 'static,
    {
        Self {
            extractor: document.clone(),
            search: document.clone(),
            positions: document.clone(),
            renderer: document.clone(),
            session: document,
        }
    }
}

/// Result of a highlight request
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightOutcome {
    /// The value was highlighted
    Highlighted(HighlightAnnotation),
    /// The context was located but the value does not occur in it on the
    /// primary page; nothing was rendered
    ValueNotFound { page: usize },
    /// A newer request started before this one finished
    Superseded,
}

/// Locates data points in the loaded document and highlights their values
pub struct HighlightController {
    cache: PageTextCache,
    locator: SpanLocator,
    positions: Arc<dyn TextPositionQuery>,
    renderer: Arc<dyn AnnotationRenderer>,
    session: Arc<dyn DocumentSession>,
    config: HighlightConfig,
    generation: AtomicU64,
}

impl HighlightController {
    pub fn new(collaborators: Collaborators, config: HighlightConfig) -> Self {
        let cache = PageTextCache::with_timeout(collaborators.extractor, config.text_timeout_secs);
        let searcher = Arc::new(PageBoundedSearcher::with_timeout(
            collaborators.search,
            config.search_timeout_secs,
        ));
        let locator =
            SpanLocator::new(cache.clone(), searcher).with_max_searches(config.max_searches);

        Self {
            cache,
            locator,
            positions: collaborators.positions,
            renderer: collaborators.renderer,
            session: collaborators.session,
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Current generation token
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Highlight a data point's value
    ///
    /// Errors from locating the context or from any collaborator propagate
    /// after the previous highlights were cleared, leaving the document
    /// unhighlighted.
    pub async fn highlight(&self, data_point: &DataPoint) -> Result<HighlightOutcome> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.renderer.clear_all().await?;

        let context = data_point.context();
        let hits = self.locator.locate_span(&context).await?;
        let Some(primary) = hits.first() else {
            return Err(HighlightError::SpanNotFound(context));
        };

        if !self.is_current(token) {
            return Ok(self.superseded(token));
        }
        self.session.clear_search_results().await?;
        self.session
            .display_search_results(&hits, self.config.search_result_color)
            .await?;
        self.session.set_active_search_result(primary).await?;

        let page = primary.page_number;
        let page_text = self.cache.get(page).await?;

        // Look for the value inside the located context, not from the top of
        // the page
        let context_start = page_text.find(primary.matched_text.as_str()).unwrap_or(0);
        let value = data_point.value.split_whitespace().collect::<Vec<_>>().join(" ");
        let found = if value.is_empty() {
            None
        } else {
            page_text[context_start..]
                .find(&value)
                .map(|i| context_start + i)
        };

        let Some(value_start) = found else {
            tracing::warn!(
                page,
                value = data_point.value.as_str(),
                context = context.as_str(),
                "Value not found in located context"
            );
            return Ok(HighlightOutcome::ValueNotFound { page });
        };

        let start = page_text[..value_start].chars().count();
        let end = start + value.chars().count();
        let quads = self.positions.text_position(page, start, end).await?;
        let quads = if value.contains(' ') {
            merge_quads_to_lines(&quads)
        } else {
            quads
        };

        if !self.is_current(token) {
            return Ok(self.superseded(token));
        }
        let annotation = HighlightAnnotation::new(page, quads, self.config.highlight_color);
        self.renderer.add_highlight(&annotation).await?;
        self.renderer.render(&annotation).await?;

        tracing::info!(
            page,
            annotation = annotation.id.as_str(),
            quads = annotation.quads.len(),
            pages = hits.len(),
            "Highlighted value"
        );

        Ok(HighlightOutcome::Highlighted(annotation))
    }

    /// Remove highlights and search results, superseding in-flight requests
    pub async fn clear(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.renderer.clear_all().await?;
        self.session.clear_search_results().await
    }

    /// Notify the controller of the loaded document's identity
    ///
    /// Returns true if the page text cache was invalidated.
    pub async fn document_changed(&self, document_id: &str) -> bool {
        self.cache.document_changed(document_id).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    fn superseded(&self, token: u64) -> HighlightOutcome {
        tracing::warn!(
            token,
            current = self.generation(),
            "Highlight superseded by a newer request"
        );
        HighlightOutcome::Superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{GlyphLayout, MemoryDocument};
    use crate::document::{Color, Rect};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn contract() -> Arc<MemoryDocument> {
        Arc::new(MemoryDocument::new(
            "contract",
            [
                "This agreement is entered into",
                "by the parties named below",
                "and is dated as of May 1, 2005 between them",
                "filler",
                "closing words alpha beta gamma",
                "delta epsilon zeta and the rest",
                "May 1, 2005 was noted; the lease is dated as of May 1, 2005",
            ],
        ))
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn controller_for(doc: Arc<MemoryDocument>) -> HighlightController {
        init_tracing();
        HighlightController::new(
            Collaborators::from_document(doc),
            HighlightConfig::default(),
        )
    }

    fn rects(annotation: &HighlightAnnotation) -> Vec<Rect> {
        annotation.quads.iter().map(|q| q.to_rect()).collect()
    }

    fn highlighted(outcome: HighlightOutcome) -> HighlightAnnotation {
        match outcome {
            HighlightOutcome::Highlighted(annotation) => annotation,
            other => panic!("expected a highlight, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_highlight_single_page() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.page_number, 3);
        assert_eq!(annotation.color, Color::rgb(0, 250, 255));
        // "and is dated as of " is 19 glyphs wide
        assert_eq!(rects(&annotation), vec![Rect::new(150.0, 36.0, 216.0, 48.0)]);

        assert_eq!(doc.annotations(), vec![annotation.clone()]);
        assert_eq!(doc.rendered(), vec![annotation.id.clone()]);
        assert_eq!(doc.search_results().len(), 1);
        assert_eq!(doc.search_result_color(), Some(Color::rgb(252, 233, 106)));
        assert_eq!(doc.active_result().map(|h| h.page_number), Some(3));
    }

    #[tokio::test]
    async fn test_highlight_context_across_pages() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("alpha beta gamma delta epsilon zeta", "beta gamma");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.page_number, 5);
        assert_eq!(annotation.quads.len(), 1);

        let pages: Vec<usize> = doc.search_results().iter().map(|h| h.page_number).collect();
        assert_eq!(pages, vec![5, 6]);
        assert_eq!(doc.active_result().map(|h| h.page_number), Some(5));
    }

    #[tokio::test]
    async fn test_value_offset_from_context_and_wrapped() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        // The first "May 1, 2005" on page 7 is outside the context. The one
        // inside it wraps after "May".
        let data_point = DataPoint::new("lease is dated as of May 1, 2005", "May 1, 2005");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.page_number, 7);
        assert_eq!(
            rects(&annotation),
            vec![
                Rect::new(324.0, 36.0, 348.0, 48.0),
                Rect::new(36.0, 50.0, 78.0, 62.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_word_value_keeps_glyph_quads() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of May 1, 2005", "2005");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.quads.len(), 4);
    }

    #[tokio::test]
    async fn test_value_not_in_context_renders_nothing() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of May 1, 2005", "June 2006");
        let outcome = controller.highlight(&data_point).await.unwrap();

        assert_eq!(outcome, HighlightOutcome::ValueNotFound { page: 3 });
        assert!(doc.annotations().is_empty());
        assert!(doc.rendered().is_empty());
    }

    #[tokio::test]
    async fn test_failure_leaves_document_unhighlighted() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");
        controller.highlight(&data_point).await.unwrap();
        assert_eq!(doc.annotations().len(), 1);

        let missing = DataPoint::new("quux frobnicate", "quux");
        let err = controller.highlight(&missing).await.unwrap_err();
        assert!(matches!(err, HighlightError::SpanNotFound(_)));
        assert!(doc.annotations().is_empty());
    }

    #[tokio::test]
    async fn test_context_with_line_breaks() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of\nMay 1,  2005", "May 1,\n2005");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.page_number, 3);
        assert_eq!(rects(&annotation), vec![Rect::new(150.0, 36.0, 216.0, 48.0)]);
    }

    #[tokio::test]
    async fn test_context_continues_from_later_occurrence() {
        // Page 1 is exactly "alpha beta" but the context runs on from page 2
        let doc = Arc::new(MemoryDocument::new(
            "repeat",
            ["alpha beta", "x alpha beta", "gamma delta epsilon"],
        ));
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("alpha beta gamma delta epsilon", "alpha beta");
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());

        assert_eq!(annotation.page_number, 2);
        assert_eq!(rects(&annotation), vec![Rect::new(48.0, 36.0, 108.0, 48.0)]);

        let pages: Vec<usize> = doc.search_results().iter().map(|h| h.page_number).collect();
        assert_eq!(pages, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_value_without_context() {
        let doc = Arc::new(MemoryDocument::with_layout(
            "plain",
            ["total due 1,250.00 by june"],
            GlyphLayout::default(),
        ));
        let controller = controller_for(doc.clone());

        let data_point = DataPoint {
            context_summary: None,
            value: "1,250.00".to_string(),
        };
        let annotation = highlighted(controller.highlight(&data_point).await.unwrap());
        assert_eq!(annotation.page_number, 1);
        assert_eq!(annotation.quads.len(), "1,250.00".len());
    }

    #[tokio::test]
    async fn test_clear() {
        let doc = contract();
        let controller = controller_for(doc.clone());

        let data_point = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");
        controller.highlight(&data_point).await.unwrap();
        let before = controller.generation();

        controller.clear().await.unwrap();
        assert!(doc.annotations().is_empty());
        assert!(doc.search_results().is_empty());
        assert!(doc.active_result().is_none());
        assert_eq!(controller.generation(), before + 1);
    }

    #[tokio::test]
    async fn test_document_changed_invalidates_cache() {
        let doc = contract();
        let controller = controller_for(doc.clone());
        assert!(controller.document_changed(doc.id()).await);

        let data_point = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");
        controller.highlight(&data_point).await.unwrap();
        assert_eq!(controller.cache_stats().await.pages_cached, 1);

        assert!(!controller.document_changed(doc.id()).await);
        assert_eq!(controller.cache_stats().await.pages_cached, 1);

        assert!(controller.document_changed("another").await);
        assert_eq!(controller.cache_stats().await.pages_cached, 0);
    }

    /// Parks the first extraction until released
    struct GatedExtractor {
        inner: Arc<MemoryDocument>,
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextExtractor for GatedExtractor {
        async fn extract_page(&self, page_number: usize) -> Result<Vec<String>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            self.inner.extract_page(page_number).await
        }

        async fn page_count(&self) -> Result<usize> {
            Ok(self.inner.page_count())
        }
    }

    #[tokio::test]
    async fn test_newer_request_supersedes() {
        let doc = contract();
        let gated = Arc::new(GatedExtractor {
            inner: doc.clone(),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let collaborators = Collaborators {
            extractor: gated.clone(),
            ..Collaborators::from_document(doc.clone())
        };
        let controller = Arc::new(HighlightController::new(
            collaborators,
            HighlightConfig::default(),
        ));
        let data_point = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");

        let first = tokio::spawn({
            let controller = controller.clone();
            let data_point = data_point.clone();
            async move { controller.highlight(&data_point).await }
        });
        while gated.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = controller.highlight(&data_point).await.unwrap();
        let annotation = highlighted(second);

        gated.gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, HighlightOutcome::Superseded);

        assert_eq!(doc.annotations(), vec![annotation]);
    }
}
