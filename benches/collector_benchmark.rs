use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use hitstream::index::memory::{MemoryIndex, LOWER};
use hitstream::query::pattern::{PatternWeight, TokenClause, TokenPattern};
use hitstream::query::SpanWeight;
use hitstream::{Config, SearchSettings, Searcher};
use std::sync::Arc;
use rand::Rng;

/// Random documents over a small vocabulary, split into `segments` segments
fn create_test_index(segments: usize, docs_per_segment: usize, words_per_doc: usize) -> Arc<MemoryIndex> {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let mut builder = MemoryIndex::builder("contents");
    for segment in 0..segments {
        if segment > 0 {
            builder = builder.new_segment();
        }
        for _ in 0..docs_per_segment {
            let text = (0..words_per_doc)
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ");
            builder = builder.add_document(&text);
        }
    }
    builder.build().unwrap()
}

fn weight(index: &Arc<MemoryIndex>, pattern: TokenPattern) -> Arc<dyn SpanWeight> {
    Arc::new(PatternWeight::new(index.clone(), pattern))
}

fn searcher(index: &Arc<MemoryIndex>, threads: usize) -> Searcher {
    let config = if threads > 1 {
        Config {
            search_pool_threads: threads,
            max_threads_per_search: threads,
            ..Config::default()
        }
    } else {
        Config::sequential()
    };
    Searcher::new(index.clone(), config).unwrap()
}

/// Benchmark reading every hit, sequential vs parallel
fn bench_collect_all(c: &mut Criterion) {
    let index = create_test_index(8, 500, 200);
    let mut group = c.benchmark_group("collect_all");

    for threads in [1, 2, 4, 8].iter() {
        let searcher = searcher(&index, *threads);
        let query = weight(&index, TokenPattern::phrase(&["the"]));
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, _| {
            b.iter(|| {
                let hits = searcher.find(query.clone(), SearchSettings::unlimited()).unwrap();
                black_box(hits.size().unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark the first page of results, where laziness matters
fn bench_first_page(c: &mut Criterion) {
    let index = create_test_index(8, 500, 200);
    let mut group = c.benchmark_group("first_page");

    for threads in [1, 4].iter() {
        let searcher = searcher(&index, *threads);
        let query = weight(&index, TokenPattern::phrase(&["quick", "brown"]));
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, _| {
            b.iter(|| {
                let hits = searcher.find(query.clone(), SearchSettings::unlimited()).unwrap();
                black_box(hits.window(0, 20).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark counting with a small materialize limit
fn bench_limited_count(c: &mut Criterion) {
    let index = create_test_index(4, 1000, 100);
    let searcher = searcher(&index, 4);
    let query = weight(
        &index,
        TokenPattern::new()
            .then(TokenClause::prefix(LOWER, "l"))
            .then(TokenClause::any()),
    );

    c.bench_function("limited_count", |b| {
        b.iter(|| {
            let hits = searcher.find(query.clone(), SearchSettings::new(Some(100), Some(50_000))).unwrap();
            black_box(hits.hits_counted_total().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_collect_all,
    bench_first_page,
    bench_limited_count
);
criterion_main!(benches);
