//! Span Location Benchmarks
//!
//! Measures locating spans over an in-memory document: spans inside one
//! page (a single search) and spans that cross one or several page
//! boundaries (halving and re-searching).
//!
//! Run with: `cargo bench --bench span_locate`

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use span_highlighter::backend::MemoryDocument;
use span_highlighter::document::PageTextCache;
use span_highlighter::locate::{PageBoundedSearcher, SpanLocator};

const WORDS_PER_PAGE: usize = 200;

/// Document of unique words, `WORDS_PER_PAGE` on each page
fn create_document(page_count: usize) -> (Arc<MemoryDocument>, Vec<String>) {
    let words: Vec<String> = (0..page_count * WORDS_PER_PAGE)
        .map(|i| format!("word{:06}", i))
        .collect();
    let pages: Vec<String> = words.chunks(WORDS_PER_PAGE).map(|c| c.join(" ")).collect();
    (Arc::new(MemoryDocument::new("bench", pages)), words)
}

fn locator(doc: Arc<MemoryDocument>) -> SpanLocator {
    SpanLocator::new(
        PageTextCache::new(doc.clone()),
        Arc::new(PageBoundedSearcher::new(doc)),
    )
}

/// Benchmark spans by how many page boundaries they cross
fn bench_locate(c: &mut Criterion) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => panic!("Failed to start runtime: {}", e),
    };
    let (doc, words) = create_document(100);
    let locator = locator(doc);

    let mut group = c.benchmark_group("locate_span");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    for boundaries in [0usize, 1, 3] {
        // Start half a page before the 50th page break
        let start = 50 * WORDS_PER_PAGE - WORDS_PER_PAGE / 2;
        let len = if boundaries == 0 {
            WORDS_PER_PAGE / 4
        } else {
            boundaries * WORDS_PER_PAGE
        };
        let span = words[start..start + len].join(" ");

        group.bench_with_input(BenchmarkId::new("boundaries", boundaries), &span, |b, span| {
            b.to_async(&runtime).iter(|| async {
                let hits = locator.locate_span(black_box(span)).await;
                black_box(hits)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_locate);
criterion_main!(benches);
