#![allow(dead_code)]

use std::sync::Arc;
use hitstream::index::memory::MemoryIndex;
use hitstream::query::pattern::{PatternWeight, TokenPattern};
use hitstream::query::SpanWeight;
use hitstream::{Config, Searcher};

/// `docs` documents spread evenly over `segments` segments, each holding
/// `per_doc` occurrences of "the".
pub fn repeated_corpus(segments: usize, docs: usize, per_doc: usize) -> Arc<MemoryIndex> {
    let text = (0..per_doc).map(|i| format!("the word{}", i)).collect::<Vec<_>>().join(" ");
    let per_segment = docs / segments;
    let mut builder = MemoryIndex::builder("contents");
    for segment in 0..segments {
        if segment > 0 {
            builder = builder.new_segment();
        }
        for _ in 0..per_segment {
            builder = builder.add_document(&text);
        }
    }
    builder.build().expect("corpus builds")
}

/// Small, readable corpus over three segments
pub fn story_corpus() -> Arc<MemoryIndex> {
    MemoryIndex::builder("contents")
        .add_document("The quick brown fox jumps over the lazy dog.")
        .add_document("A dog barks, and the cat sleeps.")
        .new_segment()
        .add_document("The cat sat on the mat. The dog did not.")
        .new_segment()
        .add_document("No animals here, only words.")
        .add_document("The end of the story is the dog.")
        .build()
        .expect("corpus builds")
}

pub fn phrase(index: &Arc<MemoryIndex>, words: &[&str]) -> Arc<dyn SpanWeight> {
    Arc::new(PatternWeight::new(index.clone(), TokenPattern::phrase(words)))
}

pub fn pattern(index: &Arc<MemoryIndex>, pattern: TokenPattern) -> Arc<dyn SpanWeight> {
    Arc::new(PatternWeight::new(index.clone(), pattern))
}

pub fn sequential_searcher(index: &Arc<MemoryIndex>) -> Searcher {
    Searcher::new(index.clone(), Config::sequential()).expect("searcher")
}

pub fn parallel_searcher(index: &Arc<MemoryIndex>, threads: usize) -> Searcher {
    let config = Config {
        search_pool_threads: threads,
        max_threads_per_search: threads,
        parallel_search: true,
        worker_batch_size: 64,
        ..Config::default()
    };
    Searcher::new(index.clone(), config).expect("searcher")
}
