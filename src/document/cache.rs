//! Page text cache
//!
//! Memoizes the plain text of each page of the loaded document. Page text
//! is the page's words joined with single spaces, which is the coordinate
//! system search offsets and text positions are expressed in.
//!
//! # Lifetime
//!
//! Entries live as long as the loaded document. `document_changed` drops
//! every entry when the document identity changes; a new document replaces
//! the cache entirely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};

use super::{HighlightError, Result, TextExtractor};

/// Default timeout for text extraction operations
const TEXT_TIMEOUT_SECS: u64 = 15;

/// Lazily extracted page text for the current document
#[derive(Clone)]
pub struct PageTextCache {
    extractor: Arc<dyn TextExtractor>,
    /// Page number -> page text
    pages: Arc<RwLock<HashMap<usize, String>>>,
    page_count: Arc<RwLock<Option<usize>>>,
    /// Identity of the document the entries belong to
    document_id: Arc<RwLock<Option<String>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    text_timeout_secs: u64,
}

impl PageTextCache {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self::with_timeout(extractor, TEXT_TIMEOUT_SECS)
    }

    pub fn with_timeout(extractor: Arc<dyn TextExtractor>, text_timeout_secs: u64) -> Self {
        Self {
            extractor,
            pages: Arc::new(RwLock::new(HashMap::new())),
            page_count: Arc::new(RwLock::new(None)),
            document_id: Arc::new(RwLock::new(None)),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            text_timeout_secs,
        }
    }

    /// Get a page's text, extracting it on first access
    pub async fn get(&self, page_number: usize) -> Result<String> {
        // Check cache first
        {
            let pages = self.pages.read().await;
            if let Some(text) = pages.get(&page_number) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(text.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(page = page_number, "Extracting page text");

        let words = timeout(
            Duration::from_secs(self.text_timeout_secs),
            self.extractor.extract_page(page_number),
        )
        .await
        .map_err(|_| HighlightError::Timeout(self.text_timeout_secs))??;
        let text = words.join(" ");

        // Cache the result
        {
            let mut pages = self.pages.write().await;
            pages.insert(page_number, text.clone());
        }

        Ok(text)
    }

    /// Number of pages in the document, asked once
    pub async fn page_count(&self) -> Result<usize> {
        if let Some(count) = *self.page_count.read().await {
            return Ok(count);
        }

        let count = timeout(
            Duration::from_secs(self.text_timeout_secs),
            self.extractor.page_count(),
        )
        .await
        .map_err(|_| HighlightError::Timeout(self.text_timeout_secs))??;

        *self.page_count.write().await = Some(count);
        Ok(count)
    }

    /// Drop every cached page
    pub async fn invalidate(&self) {
        let mut pages = self.pages.write().await;
        pages.clear();
        drop(pages);
        *self.page_count.write().await = None;
    }

    /// Record the loaded document, clearing the cache when it changed
    ///
    /// Returns true if the cache was invalidated.
    pub async fn document_changed(&self, document_id: &str) -> bool {
        let mut current = self.document_id.write().await;
        if current.as_deref() == Some(document_id) {
            return false;
        }

        tracing::debug!(
            previous = ?current.as_deref(),
            document = document_id,
            "Document changed, invalidating page text cache"
        );
        *current = Some(document_id.to_string());
        drop(current);

        self.invalidate().await;
        true
    }

    /// Identity of the document the cache currently belongs to
    pub async fn document_id(&self) -> Option<String> {
        self.document_id.read().await.clone()
    }

    /// Number of cached pages
    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            pages_cached: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached page texts
    pub pages_cached: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that ran text extraction
    pub misses: u64,
}
