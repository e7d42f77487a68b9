//! Span location across page boundaries
//!
//! The search primitive only finds phrases that lie wholly within one page
//! and only ever reports the first match. `SpanLocator` reconstructs the
//! ordered per-page hits covering a span by searching halves of the phrase,
//! widening a half that matched to the edge of its page using the cached
//! page text, and recursing on whatever is left over.
//!
//! A remainder left over after widening must continue on the adjacent page
//! (blank pages in between are skipped): it has to open the next page, or
//! close the previous one. Hits that do not join up that way are rejected
//! and the next occurrence of the half is tried.
//!
//! # Preconditions
//!
//! - The span occurs once in the document. Earlier occurrences of a half
//!   that do not continue into the rest of the span are skipped; when no
//!   occurrence continues, location fails with
//!   [`HighlightError::AmbiguousSpan`].
//! - Page texts are joined with single spaces in reading order, and the
//!   span uses single spaces between words.
//!
//! Every recursive call works on a strictly shorter phrase, so location
//! terminates. Searches are awaited one after another, never in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::searcher::PageBoundedSearcher;
use crate::document::{HighlightError, PageRange, PageTextCache, Result, SearchHit};

/// Locates spans that may cross page boundaries
pub struct SpanLocator {
    cache: PageTextCache,
    searcher: Arc<PageBoundedSearcher>,
    /// Maximum searches per `locate` call (0 = unlimited)
    max_searches: usize,
}

/// Which half of a phrase matched on a single page
#[derive(Debug, Clone, Copy)]
enum Direction {
    /// The first half: widen to the end of its page
    Forward,
    /// The second half: widen to the top of its page
    Backward,
}

/// Searches charged against one `locate` call
struct SearchBudget {
    limit: usize,
    used: AtomicUsize,
}

impl SearchBudget {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    fn charge(&self) -> Result<()> {
        let used = self.used.fetch_add(1, Ordering::Relaxed) + 1;
        if self.limit > 0 && used > self.limit {
            return Err(HighlightError::SearchBudgetExhausted(self.limit));
        }
        Ok(())
    }
}

impl SpanLocator {
    pub fn new(cache: PageTextCache, searcher: Arc<PageBoundedSearcher>) -> Self {
        Self {
            cache,
            searcher,
            max_searches: 0,
        }
    }

    pub fn with_max_searches(mut self, max_searches: usize) -> Self {
        self.max_searches = max_searches;
        self
    }

    /// Locate a span anywhere in the document
    pub async fn locate_span(&self, phrase: &str) -> Result<Vec<SearchHit>> {
        self.locate(phrase, false, PageRange::all()).await
    }

    /// Ordered per-page hits whose matched texts, joined with single
    /// spaces, reproduce `phrase`
    ///
    /// With `skip_whole_search` the phrase goes straight to halving instead
    /// of first being searched as a whole.
    pub async fn locate(
        &self,
        phrase: &str,
        skip_whole_search: bool,
        range: PageRange,
    ) -> Result<Vec<SearchHit>> {
        let budget = SearchBudget::new(self.max_searches);
        let hits = self
            .locate_within(phrase, skip_whole_search, range, &budget)
            .await?;

        tracing::debug!(
            phrase = phrase,
            hits = hits.len(),
            searches = budget.used.load(Ordering::Relaxed),
            "Located span"
        );
        Ok(hits)
    }

    fn locate_within<'a>(
        &'a self,
        phrase: &'a str,
        skip_whole_search: bool,
        range: PageRange,
        budget: &'a SearchBudget,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        async move {
            let phrase = phrase.trim();
            if phrase.is_empty() {
                return Ok(Vec::new());
            }

            if !skip_whole_search {
                if let Some(hit) = self.search(phrase, range, budget).await? {
                    return Ok(vec![hit]);
                }
            }

            let Some((first_half, second_half)) = split_phrase(phrase) else {
                // A single word never spans pages
                if skip_whole_search {
                    if let Some(hit) = self.search(phrase, range, budget).await? {
                        return Ok(vec![hit]);
                    }
                }
                return Err(HighlightError::SpanNotFound(phrase.to_string()));
            };

            let mut ambiguity = None;
            for (direction, half) in [
                (Direction::Forward, first_half),
                (Direction::Backward, second_half),
            ] {
                match self
                    .extend_from_half(direction, phrase, half, range, budget)
                    .await
                {
                    Ok(Some(hits)) => return Ok(hits),
                    Ok(None) => {}
                    Err(e @ HighlightError::AmbiguousSpan { .. }) => {
                        if ambiguity.is_none() {
                            ambiguity = Some(e);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }

            // Neither half is on one page where the span continues: halve
            // each again
            match self
                .locate_halves(first_half, second_half, range, budget)
                .await
            {
                Ok(hits) => Ok(hits),
                Err(
                    e @ (HighlightError::SpanNotFound(_) | HighlightError::AmbiguousSpan { .. }),
                ) => Err(ambiguity.unwrap_or(e)),
                Err(e) => Err(e),
            }
        }
        .boxed()
    }

    async fn locate_halves(
        &self,
        first_half: &str,
        second_half: &str,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Vec<SearchHit>> {
        let mut hits = self.locate_within(first_half, true, range, budget).await?;
        let joined_at = hits.len();
        hits.extend(self.locate_within(second_half, true, range, budget).await?);

        if !self.joins_up(&hits).await? {
            let page = hits.get(joined_at).map_or(0, |h| h.page_number);
            return Err(HighlightError::AmbiguousSpan {
                page,
                text: second_half.to_string(),
            });
        }
        Ok(hits)
    }

    /// Try each page where `half` occurs, in page order, until the span
    /// extends from one of them
    ///
    /// `None` when the half occurs nowhere in `range`.
    async fn extend_from_half(
        &self,
        direction: Direction,
        phrase: &str,
        half: &str,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<Vec<SearchHit>>> {
        let mut candidates = range;
        let mut ambiguity = None;

        while let Some(hit) = self.search(half, candidates, budget).await? {
            let page = hit.page_number;
            let extended = match direction {
                Direction::Forward => {
                    self.extend_forward(phrase, half, hit, range, budget).await
                }
                Direction::Backward => {
                    self.extend_backward(phrase, half, hit, range, budget).await
                }
            };
            match extended {
                Ok(hits) => return Ok(Some(hits)),
                Err(e @ HighlightError::AmbiguousSpan { .. }) => {
                    if ambiguity.is_none() {
                        ambiguity = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
            candidates = candidates.with_start(page + 1);
        }

        ambiguity.map_or(Ok(None), Err)
    }

    /// The first half of `phrase` matched on a page: the span starts there
    /// and runs to the end of that page's text, or ends on it
    async fn extend_forward(
        &self,
        phrase: &str,
        half: &str,
        hit: SearchHit,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Vec<SearchHit>> {
        let page = hit.page_number;
        let page_text = self.cache.get(page).await?;
        let matched = matched_text(&hit, half);

        let mut occurrences = 0;
        for start in occurrences_of(&page_text, matched) {
            occurrences += 1;
            let tail = &page_text[start..];

            if tail.starts_with(phrase) {
                let exact = self.search_page(phrase, page, budget).await?;
                return Ok(vec![exact]);
            }

            let Some(rest) = phrase.strip_prefix(tail).filter(|r| r.starts_with(' ')) else {
                continue;
            };

            tracing::debug!(page, on_page = tail, "Span continues past end of page");
            let Some(remainder) = self.continue_forward(rest, page, range, budget).await? else {
                tracing::debug!(page, on_page = tail, "Span does not continue on the next page");
                continue;
            };
            let mut hits = vec![self.search_page(tail, page, budget).await?];
            hits.extend(remainder);
            return Ok(hits);
        }

        Err(mismatch(occurrences, page, matched))
    }

    /// The second half of `phrase` matched on a page: the span ends there
    /// and starts at the top of that page's text, or on it
    async fn extend_backward(
        &self,
        phrase: &str,
        half: &str,
        hit: SearchHit,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Vec<SearchHit>> {
        let page = hit.page_number;
        let page_text = self.cache.get(page).await?;
        let matched = matched_text(&hit, half);

        let mut occurrences = 0;
        for start in occurrences_of(&page_text, matched) {
            occurrences += 1;
            let head = &page_text[..start + matched.len()];

            if head.ends_with(phrase) {
                let exact = self.search_page(phrase, page, budget).await?;
                return Ok(vec![exact]);
            }

            let Some(rest) = phrase.strip_suffix(head).filter(|r| r.ends_with(' ')) else {
                continue;
            };

            tracing::debug!(page, on_page = head, "Span starts before top of page");
            let Some(mut hits) = self.continue_backward(rest, page, range, budget).await? else {
                tracing::debug!(page, on_page = head, "Span does not end the previous page");
                continue;
            };
            hits.push(self.search_page(head, page, budget).await?);
            return Ok(hits);
        }

        Err(mismatch(occurrences, page, matched))
    }

    /// Hits for `rest`, which must open the first non-blank page after
    /// `page` and run on from there
    ///
    /// `None` when it does not.
    async fn continue_forward(
        &self,
        rest: &str,
        page: usize,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<Vec<SearchHit>>> {
        match self
            .locate_within(rest, false, range.with_start(page + 1), budget)
            .await
        {
            Ok(hits) => {
                let end_of_page = self.cache.get(page).await?.len();
                if !hits.is_empty() && self.reads_on(&hits, page, end_of_page).await? {
                    return Ok(Some(hits));
                }
            }
            Err(HighlightError::SpanNotFound(_) | HighlightError::AmbiguousSpan { .. }) => {}
            Err(e) => return Err(e),
        }

        self.walk_forward(rest.trim(), page + 1, range, budget).await
    }

    /// Hits for `rest`, which must close the last non-blank page before
    /// `page`
    async fn continue_backward(
        &self,
        rest: &str,
        page: usize,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<Vec<SearchHit>>> {
        let Some(previous) = page.checked_sub(1).filter(|p| *p > 0) else {
            return Ok(None);
        };

        match self
            .locate_within(rest, false, range.with_end(previous), budget)
            .await
        {
            Ok(hits) => {
                if !hits.is_empty() && self.reads_back(&hits, page, 0).await? {
                    return Ok(Some(hits));
                }
            }
            Err(HighlightError::SpanNotFound(_) | HighlightError::AmbiguousSpan { .. }) => {}
            Err(e) => return Err(e),
        }

        self.walk_backward(rest.trim(), previous, range, budget).await
    }

    /// Consume `rest` page by page from the top of `page`
    async fn walk_forward(
        &self,
        rest: &str,
        mut page: usize,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<Vec<SearchHit>>> {
        let page_count = self.cache.page_count().await?;
        let last = range.end.map_or(page_count, |end| end.min(page_count));
        let mut rest = rest;
        let mut hits = Vec::new();

        while page <= last && !rest.is_empty() {
            let text = self.cache.get(page).await?;
            if text.is_empty() {
                page += 1;
                continue;
            }
            if at_page_start(&text, rest) {
                hits.push(self.search_page(rest, page, budget).await?);
                return Ok(Some(hits));
            }
            let Some(next) = rest
                .strip_prefix(text.as_str())
                .and_then(|r| r.strip_prefix(' '))
            else {
                return Ok(None);
            };
            hits.push(self.search_page(&text, page, budget).await?);
            rest = next;
            page += 1;
        }

        Ok(None)
    }

    /// Consume `rest` page by page from the bottom of `page`
    async fn walk_backward(
        &self,
        rest: &str,
        mut page: usize,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<Vec<SearchHit>>> {
        let first = range.start.unwrap_or(1).max(1);
        let mut rest = rest;
        let mut hits = Vec::new();

        while page >= first && !rest.is_empty() {
            let text = self.cache.get(page).await?;
            if text.is_empty() {
                page -= 1;
                continue;
            }
            if at_page_end(&text, rest) {
                hits.insert(0, self.search_page(rest, page, budget).await?);
                return Ok(Some(hits));
            }
            let Some(next) = rest
                .strip_suffix(text.as_str())
                .and_then(|r| r.strip_suffix(' '))
            else {
                return Ok(None);
            };
            hits.insert(0, self.search_page(&text, page, budget).await?);
            rest = next;
            page -= 1;
        }

        Ok(None)
    }

    /// `after` is the first non-blank page following `before`
    async fn follows(&self, before: usize, after: usize) -> Result<bool> {
        if after <= before {
            return Ok(false);
        }
        for page in before + 1..after {
            if !self.cache.get(page).await?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Some occurrence of the first hit is continued, in order, by the rest
    async fn joins_up(&self, hits: &[SearchHit]) -> Result<bool> {
        let Some(first) = hits.first() else {
            return Ok(true);
        };
        let text = self.cache.get(first.page_number).await?;
        let matched = first.matched_text.trim();

        for start in occurrences_of(&text, matched) {
            if self
                .reads_on(&hits[1..], first.page_number, start + matched.len())
                .await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Hits read on from byte `offset` of `page`, each starting one space
    /// after the previous ended, or at the top of the next non-blank page
    /// once a page is used up
    async fn reads_on(
        &self,
        hits: &[SearchHit],
        mut page: usize,
        mut offset: usize,
    ) -> Result<bool> {
        let mut text = self.cache.get(page).await?;

        for hit in hits {
            let matched = hit.matched_text.trim();
            if hit.page_number == page {
                let start = if offset == 0 {
                    0
                } else if text[offset..].starts_with(' ') {
                    offset + 1
                } else {
                    return Ok(false);
                };
                if !text[start..].starts_with(matched) {
                    return Ok(false);
                }
                offset = start + matched.len();
            } else {
                if offset < text.len() || !self.follows(page, hit.page_number).await? {
                    return Ok(false);
                }
                page = hit.page_number;
                text = self.cache.get(page).await?;
                if !text.starts_with(matched) {
                    return Ok(false);
                }
                offset = matched.len();
            }
        }
        Ok(true)
    }

    /// Mirror of [`Self::reads_on`]: hits, last first, read back from byte
    /// `offset` of `page`
    async fn reads_back(
        &self,
        hits: &[SearchHit],
        mut page: usize,
        mut offset: usize,
    ) -> Result<bool> {
        let mut text = self.cache.get(page).await?;

        for hit in hits.iter().rev() {
            let matched = hit.matched_text.trim();
            if hit.page_number == page {
                let end = if offset == text.len() {
                    offset
                } else if text[..offset].ends_with(' ') {
                    offset - 1
                } else {
                    return Ok(false);
                };
                if !text[..end].ends_with(matched) {
                    return Ok(false);
                }
                offset = end - matched.len();
            } else {
                if offset > 0 || !self.follows(hit.page_number, page).await? {
                    return Ok(false);
                }
                page = hit.page_number;
                text = self.cache.get(page).await?;
                if !text.ends_with(matched) {
                    return Ok(false);
                }
                offset = text.len() - matched.len();
            }
        }
        Ok(true)
    }

    async fn search(
        &self,
        phrase: &str,
        range: PageRange,
        budget: &SearchBudget,
    ) -> Result<Option<SearchHit>> {
        budget.charge()?;
        self.searcher.search_once(phrase, range).await
    }

    /// Exact match record for text known to be on `page`
    async fn search_page(&self, text: &str, page: usize, budget: &SearchBudget) -> Result<SearchHit> {
        self.search(text, PageRange::single(page), budget)
            .await?
            .ok_or_else(|| HighlightError::InconsistentText {
                page,
                text: text.to_string(),
            })
    }
}

/// Split at the first space at or after the midpoint (in characters),
/// falling back to the last space before it
fn split_phrase(phrase: &str) -> Option<(&str, &str)> {
    let half = (phrase.chars().count() + 1) / 2;
    let mid = phrase
        .char_indices()
        .nth(half)
        .map_or(phrase.len(), |(i, _)| i);

    let split = phrase[mid..]
        .find(' ')
        .map(|i| mid + i)
        .or_else(|| phrase[..mid].rfind(' '))?;

    let first = phrase[..split].trim_end();
    let second = phrase[split + 1..].trim_start();
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some((first, second))
}

/// Text the search primitive reports; primitives may trim the query
fn matched_text<'a>(hit: &'a SearchHit, searched: &'a str) -> &'a str {
    let matched = hit.matched_text.trim();
    if matched.is_empty() {
        searched
    } else {
        matched
    }
}

/// Byte offsets of every occurrence of `pattern` in `text`, overlapping
/// ones included
fn occurrences_of<'a>(text: &'a str, pattern: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.char_indices()
        .map(|(i, _)| i)
        .filter(move |&i| !pattern.is_empty() && text[i..].starts_with(pattern))
}

/// `text` opens the page, ending on a word boundary
fn at_page_start(page_text: &str, text: &str) -> bool {
    !text.is_empty()
        && page_text
            .strip_prefix(text)
            .map_or(false, |after| after.is_empty() || after.starts_with(' '))
}

/// `text` closes the page, starting on a word boundary
fn at_page_end(page_text: &str, text: &str) -> bool {
    !text.is_empty()
        && page_text
            .strip_suffix(text)
            .map_or(false, |before| before.is_empty() || before.ends_with(' '))
}

fn mismatch(occurrences: usize, page: usize, text: &str) -> HighlightError {
    if occurrences == 0 {
        HighlightError::InconsistentText {
            page,
            text: text.to_string(),
        }
    } else {
        HighlightError::AmbiguousSpan {
            page,
            text: text.to_string(),
        }
    }
}
