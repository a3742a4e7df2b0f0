mod common;

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use common::*;
use hitstream::core::error::ErrorKind;
use hitstream::index::SegmentInfo;
use hitstream::index::memory::{MemoryIndex, LOWER};
use hitstream::query::pattern::{TokenClause, TokenPattern};
use hitstream::query::{SegmentCursor, SpanWeight};
use hitstream::{Checkpoint, Config, Hit, SearchSettings, Searcher};

#[test]
fn sequential_finds_hits_in_index_order() {
    let index = story_corpus();
    let searcher = sequential_searcher(&index);
    let hits = searcher.find(phrase(&index, &["the"]), SearchSettings::unlimited()).unwrap();

    let all = hits.all_hits().unwrap();
    assert_eq!(all.len(), 9);
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(all[0], Hit::new(0, 0, 1));
    assert_eq!(all[1], Hit::new(0, 6, 7));
    assert_eq!(hits.docs_counted_total().unwrap(), 4);
    assert!(hits.done_processing_and_counting());
}

#[test]
fn parallel_matches_sequential() {
    let index = repeated_corpus(4, 200, 7);
    let weight = phrase(&index, &["the"]);
    let settings = SearchSettings::new(Some(500), Some(1_000));

    let sequential = sequential_searcher(&index).find(weight.clone(), settings).unwrap();
    let parallel = parallel_searcher(&index, 4).find(weight, settings).unwrap();

    assert_eq!(sequential.all_hits().unwrap(), parallel.all_hits().unwrap());
    assert_eq!(sequential.hits_stats(), parallel.hits_stats());
    assert_eq!(parallel.size().unwrap(), 500);
    assert_eq!(parallel.hits_counted_total().unwrap(), 1_000);
    assert!(parallel.max_stats().hits_processed_exceeded);
    assert!(parallel.max_stats().hits_counted_exceeded);
}

#[test]
fn parallel_without_limits_reads_every_segment() {
    let index = repeated_corpus(3, 90, 4);
    let hits = parallel_searcher(&index, 2)
        .find(phrase(&index, &["the"]), SearchSettings::unlimited())
        .unwrap();

    assert_eq!(hits.size().unwrap(), 360);
    assert_eq!(hits.docs_processed_total().unwrap(), 90);
    assert!(!hits.max_stats().exceeded_any());
    let all = hits.all_hits().unwrap();
    assert!(all.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn materialize_limit_keeps_counting() {
    // 10 000 hits in 4 segments, only 100 materialized
    let index = repeated_corpus(4, 2_000, 5);
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 4)] {
        let hits = searcher
            .find(phrase(&index, &["the"]), SearchSettings::new(Some(100), None))
            .unwrap();

        assert_eq!(hits.size().unwrap(), 100);
        assert_eq!(hits.hits_counted_total().unwrap(), 10_000);
        assert_eq!(hits.docs_counted_total().unwrap(), 2_000);
        // 5 hits per document, so the first 100 hits cover 20 documents
        assert_eq!(hits.docs_processed_total().unwrap(), 20);
        assert!(hits.max_stats().hits_processed_exceeded);
        assert!(!hits.max_stats().hits_counted_exceeded);
    }
}

#[test]
fn count_limit_stops_iteration() {
    let index = repeated_corpus(2, 100, 5);
    let hits = sequential_searcher(&index)
        .find(phrase(&index, &["the"]), SearchSettings::new(Some(10), Some(42)))
        .unwrap();

    assert_eq!(hits.size().unwrap(), 10);
    assert_eq!(hits.hits_counted_total().unwrap(), 42);
    assert!(hits.max_stats().hits_counted_exceeded);
    assert!(hits.query_info().max_stats().hits_counted_exceeded);
}

#[test]
fn ensure_results_read_is_monotonic() {
    let index = repeated_corpus(2, 100, 3);
    let hits = sequential_searcher(&index)
        .find(phrase(&index, &["the"]), SearchSettings::unlimited())
        .unwrap();

    hits.ensure_results_read(50).unwrap();
    let first = hits.hits_snapshot();
    assert!(first.len() >= 50);
    assert!(!hits.done_processing_and_counting());

    hits.ensure_results_read(10).unwrap();
    let second = hits.hits_snapshot();
    assert_eq!(&second[..first.len()], &first[..]);

    hits.ensure_all_read().unwrap();
    let all = hits.hits_snapshot();
    assert_eq!(all.len(), 300);
    assert_eq!(&all[..first.len()], &first[..]);
}

#[test]
fn concurrent_callers_share_one_result_list() {
    let index = repeated_corpus(4, 400, 5);
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 3)] {
        let hits = searcher.find(phrase(&index, &["the"]), SearchSettings::unlimited()).unwrap();
        let handles: Vec<_> = [10, 500, 1_999, usize::MAX]
            .into_iter()
            .map(|n| {
                let hits = hits.clone();
                thread::spawn(move || {
                    if n == usize::MAX {
                        hits.ensure_all_read().unwrap();
                    } else {
                        hits.ensure_results_read(n).unwrap();
                        assert!(hits.size_so_far() >= n);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let all = hits.all_hits().unwrap();
        assert_eq!(all.len(), 2_000);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn cancellation_interrupts_and_keeps_prefix() {
    let index = repeated_corpus(4, 400, 5);
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 2)] {
        let checkpoint = Checkpoint::new();
        let hits = searcher
            .find_with_checkpoint(phrase(&index, &["the"]), SearchSettings::unlimited(), checkpoint.clone())
            .unwrap();

        hits.ensure_results_read(50).unwrap();
        let prefix = hits.hits_snapshot();
        checkpoint.cancel();

        let err = hits.size().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(&hits.hits_snapshot()[..prefix.len()], &prefix[..]);
        let stats = hits.max_stats();
        assert!(stats.hits_processed_exceeded && stats.hits_counted_exceeded);
        assert!(hits.done_processing_and_counting());
    }
}

#[test]
fn paused_search_waits_for_resume() {
    let index = repeated_corpus(1, 50, 2);
    let searcher = sequential_searcher(&index);
    let checkpoint = Checkpoint::new();
    let hits = searcher
        .find_with_checkpoint(phrase(&index, &["the"]), SearchSettings::unlimited(), checkpoint.clone())
        .unwrap();

    checkpoint.pause();
    let reader = {
        let hits = hits.clone();
        thread::spawn(move || hits.size())
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(hits.size_so_far(), 0);
    assert!(!reader.is_finished());

    checkpoint.resume();
    assert_eq!(reader.join().unwrap().unwrap(), 100);
}

#[test]
fn broad_prefix_is_rejected_before_searching() {
    let index = MemoryIndex::builder("contents")
        .add_document("the tall tree took time to topple")
        .build()
        .unwrap();
    let config = Config { max_terms_per_query: 3, ..Config::sequential() };
    let searcher = Searcher::new(index.clone(), config).unwrap();

    let broad = pattern(&index, TokenPattern::new().then(TokenClause::prefix(LOWER, "t")));
    let err = searcher.find(broad, SearchSettings::unlimited()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::QueryTooBroad);

    let narrow = pattern(&index, TokenPattern::new().then(TokenClause::prefix(LOWER, "to")));
    let hits = searcher.find(narrow, SearchSettings::unlimited()).unwrap();
    // took, to, topple
    assert_eq!(hits.size().unwrap(), 3);
}

#[test]
fn deleted_documents_are_skipped() {
    let index = MemoryIndex::builder("contents")
        .add_document("a cat")
        .add_document("another cat")
        .new_segment()
        .add_document("cat and cat")
        .delete(1)
        .build()
        .unwrap();

    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 2)] {
        let hits = searcher.find(phrase(&index, &["cat"]), SearchSettings::unlimited()).unwrap();
        let all = hits.all_hits().unwrap();
        assert_eq!(all, vec![Hit::new(0, 1, 2), Hit::new(2, 0, 1), Hit::new(2, 2, 3)]);
    }
}

#[test]
fn captures_travel_with_hits() {
    let index = story_corpus();
    let weight = pattern(
        &index,
        TokenPattern::new()
            .then(TokenClause::term(LOWER, "the"))
            .then(TokenClause::any().captured_as("noun")),
    );
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 3)] {
        let hits = searcher.find(weight.clone(), SearchSettings::unlimited()).unwrap();
        assert_eq!(hits.size().unwrap(), 9);
        assert_eq!(hits.capture_names().as_deref(), Some(&["noun".to_string()][..]));

        let first = hits.get(0).unwrap().unwrap();
        let spans = hits.captures_of(&first).unwrap();
        assert_eq!(spans[0].map(|s| (s.start, s.end)), Some((1, 2)));

        let window = hits.window(2, 3).unwrap();
        for hit in window.all_hits().unwrap() {
            assert_eq!(window.captures_of(&hit), hits.captures_of(&hit));
        }
    }
}

#[test]
fn unknown_term_gives_empty_results() {
    let index = story_corpus();
    let hits = parallel_searcher(&index, 2)
        .find(phrase(&index, &["unicorn"]), SearchSettings::unlimited())
        .unwrap();
    assert_eq!(hits.size().unwrap(), 0);
    assert!(hits.is_empty().unwrap());
    assert!(hits.done_processing_and_counting());
}

#[test]
fn searcher_picks_collector_by_config() {
    let index = repeated_corpus(2, 10, 1);
    let hits = Searcher::new(index.clone(), Config::default())
        .unwrap()
        .find(phrase(&index, &["the"]), SearchSettings::unlimited())
        .unwrap();
    assert_eq!(hits.size().unwrap(), 10);
    assert_eq!(hits.docs_counted_total().unwrap(), 10);
}

#[test]
fn zero_materialize_limit_only_counts() {
    let index = repeated_corpus(2, 10, 3);
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 2)] {
        let hits = searcher
            .find(phrase(&index, &["the"]), SearchSettings::new(Some(0), None))
            .unwrap();
        assert_eq!(hits.size().unwrap(), 0);
        assert_eq!(hits.hits_counted_total().unwrap(), 30);
        assert_eq!(hits.docs_counted_total().unwrap(), 10);
        assert_eq!(hits.docs_processed_total().unwrap(), 0);
        assert!(hits.max_stats().hits_processed_exceeded);
    }
}

/// One hit per document; the `fail_on`-th `next_start` call errors
struct FlakyCursor {
    docs: u32,
    doc: Option<u32>,
    start: Option<u32>,
    calls: usize,
    fail_on: usize,
}

impl SegmentCursor for FlakyCursor {
    fn next_doc(&mut self) -> hitstream::Result<Option<u32>> {
        let next = self.doc.map_or(0, |d| d + 1);
        self.doc = Some(next);
        self.start = None;
        Ok((next < self.docs).then_some(next))
    }

    fn next_start(&mut self) -> hitstream::Result<Option<u32>> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(io::Error::other("posting list truncated").into());
        }
        if self.start.is_some() {
            return Ok(None);
        }
        self.start = Some(0);
        Ok(Some(0))
    }

    fn doc(&self) -> u32 {
        self.doc.unwrap_or(0)
    }

    fn start(&self) -> u32 {
        self.start.unwrap_or(0)
    }

    fn end(&self) -> u32 {
        self.start() + 1
    }
}

struct FlakyWeight {
    fail_on: usize,
}

impl SpanWeight for FlakyWeight {
    fn extract_terms(&self, _max_terms: usize) -> hitstream::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn cursor(&self, segment: &SegmentInfo) -> hitstream::Result<Option<Box<dyn SegmentCursor>>> {
        Ok(Some(Box::new(FlakyCursor {
            docs: segment.doc_count,
            doc: None,
            start: None,
            calls: 0,
            fail_on: self.fail_on,
        })))
    }
}

#[test]
fn storage_error_is_not_retried() {
    let index = repeated_corpus(2, 10, 1);
    for searcher in [sequential_searcher(&index), parallel_searcher(&index, 2)] {
        let hits = searcher
            .find(Arc::new(FlakyWeight { fail_on: 4 }), SearchSettings::unlimited())
            .unwrap();

        assert_eq!(hits.size().unwrap_err().kind, ErrorKind::Io);
        // Later requests report the same failure instead of resuming the cursor
        assert_eq!(hits.size().unwrap_err().kind, ErrorKind::Io);
        assert_eq!(hits.ensure_results_read(1).unwrap_err().kind, ErrorKind::Io);
        assert!(!hits.done_processing_and_counting());
        assert!(!hits.max_stats().exceeded_any());
    }
}
