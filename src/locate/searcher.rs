//! Page-bounded search
//!
//! Thin async wrapper over the single-result search primitive. The
//! primitive holds one cursor over the open document, so every search
//! takes the session lock for its whole duration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::document::{
    HighlightError, PageRange, Result, SearchHit, SearchOutcome, SearchPrimitive, SearchRequest,
};

/// Default timeout for one search
const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Issues one search at a time against the search primitive
pub struct PageBoundedSearcher {
    primitive: Arc<dyn SearchPrimitive>,
    /// Held while a search is outstanding
    session: Mutex<()>,
    searches: AtomicUsize,
    search_timeout_secs: u64,
}

impl PageBoundedSearcher {
    pub fn new(primitive: Arc<dyn SearchPrimitive>) -> Self {
        Self::with_timeout(primitive, SEARCH_TIMEOUT_SECS)
    }

    pub fn with_timeout(primitive: Arc<dyn SearchPrimitive>, search_timeout_secs: u64) -> Self {
        Self {
            primitive,
            session: Mutex::new(()),
            searches: AtomicUsize::new(0),
            search_timeout_secs,
        }
    }

    /// Find the first occurrence of `phrase` lying wholly within one page
    /// of `range`
    ///
    /// Resolves to `None` when the primitive reaches the end of the range
    /// without a match or reports a non-found result code.
    pub async fn search_once(&self, phrase: &str, range: PageRange) -> Result<Option<SearchHit>> {
        if range.is_empty() || phrase.is_empty() {
            return Ok(None);
        }

        let _cursor = self.session.lock().await;
        self.searches.fetch_add(1, Ordering::Relaxed);

        let request = SearchRequest::new(phrase, range);
        let outcome = timeout(
            Duration::from_secs(self.search_timeout_secs),
            self.primitive.search(&request),
        )
        .await
        .map_err(|_| HighlightError::Timeout(self.search_timeout_secs))??;

        let hit = match outcome {
            SearchOutcome::Result(hit) if hit.is_found() => Some(hit),
            SearchOutcome::Result(_) | SearchOutcome::DocumentEnd => None,
        };

        tracing::debug!(
            phrase = phrase,
            start = ?range.start,
            end = ?range.end,
            page = ?hit.as_ref().map(|h| h.page_number),
            "Page-bounded search"
        );

        Ok(hit)
    }

    /// Total searches issued through this searcher
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ResultCode;
    use async_trait::async_trait;

    /// Finds phrases in a fixed list of page texts
    struct FixedPages {
        pages: Vec<&'static str>,
    }

    #[async_trait]
    impl SearchPrimitive for FixedPages {
        async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
            let first = request.range.start.unwrap_or(1);
            let last = request.range.end.unwrap_or(self.pages.len());
            for page in first..=last.min(self.pages.len()) {
                if self.pages[page - 1].contains(&request.phrase) {
                    return Ok(SearchOutcome::Result(SearchHit::found(
                        page,
                        &request.phrase,
                        vec![],
                    )));
                }
            }
            Ok(SearchOutcome::DocumentEnd)
        }
    }

    struct FailedResult;

    #[async_trait]
    impl SearchPrimitive for FailedResult {
        async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
            let mut hit = SearchHit::found(1, &request.phrase, vec![]);
            hit.result_code = ResultCode::Failed;
            Ok(SearchOutcome::Result(hit))
        }
    }

    fn searcher() -> PageBoundedSearcher {
        PageBoundedSearcher::new(Arc::new(FixedPages {
            pages: vec!["alpha beta", "gamma delta", "alpha omega"],
        }))
    }

    #[tokio::test]
    async fn test_first_match_in_range() {
        let searcher = searcher();

        let hit = searcher.search_once("alpha", PageRange::all()).await.unwrap();
        assert_eq!(hit.unwrap().page_number, 1);

        let hit = searcher.search_once("alpha", PageRange::from(2)).await.unwrap();
        assert_eq!(hit.unwrap().page_number, 3);
    }

    #[tokio::test]
    async fn test_end_of_range_is_none() {
        let searcher = searcher();

        let hit = searcher.search_once("omega", PageRange::until(2)).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(searcher.search_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_range_skips_primitive() {
        let searcher = searcher();

        let hit = searcher.search_once("alpha", PageRange::until(0)).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(searcher.search_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_result_code_is_none() {
        let searcher = PageBoundedSearcher::new(Arc::new(FailedResult));

        let hit = searcher.search_once("alpha", PageRange::all()).await.unwrap();
        assert!(hit.is_none());
    }
}
