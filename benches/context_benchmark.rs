use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use hitstream::context::concordances::ConcordanceType;
use hitstream::index::memory::{MemoryIndex, WORD};
use hitstream::query::pattern::{PatternWeight, TokenPattern};
use hitstream::search::property::DocIdProperty;
use hitstream::{Config, ContextSize, Hits, SearchSettings, Searcher};
use std::sync::Arc;
use rand::Rng;

fn create_test_hits(docs: usize, words_per_doc: usize) -> Hits {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog,"];
    let texts: Vec<String> = (0..docs)
        .map(|_| {
            (0..words_per_doc)
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let index = MemoryIndex::builder("contents")
        .add_documents(texts.iter().map(String::as_str))
        .build()
        .unwrap();
    let searcher = Searcher::new(index.clone(), Config::sequential()).unwrap();
    let weight = Arc::new(PatternWeight::new(index, TokenPattern::phrase(&["fox"])));
    let hits = searcher.find(weight, SearchSettings::unlimited()).unwrap();
    hits.ensure_all_read().unwrap();
    hits
}

/// Benchmark raw context arrays for growing context sizes
fn bench_contexts(c: &mut Criterion) {
    let hits = create_test_hits(500, 300);
    let mut group = c.benchmark_group("contexts");

    for words in [1u32, 5, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(words), words, |b, &words| {
            b.iter(|| black_box(hits.contexts(ContextSize::symmetric(words), &[WORD]).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark kwic building; a fresh window each time so the cache stays cold
fn bench_kwics(c: &mut Criterion) {
    let hits = create_test_hits(500, 300);
    c.bench_function("kwics_cold", |b| {
        b.iter(|| {
            let page = hits.window(0, 1_000).unwrap();
            black_box(page.kwics(ContextSize::symmetric(5)).unwrap())
        });
    });
    c.bench_function("kwics_cached", |b| {
        b.iter(|| black_box(hits.kwics(ContextSize::symmetric(5)).unwrap()));
    });
}

fn bench_concordances(c: &mut Criterion) {
    let hits = create_test_hits(200, 300);
    let mut group = c.benchmark_group("concordances");
    group.bench_function("forward_index", |b| {
        b.iter(|| {
            let page = hits.window(0, 500).unwrap();
            black_box(page.concordances(ContextSize::symmetric(5), ConcordanceType::ForwardIndex).unwrap())
        });
    });
    group.bench_function("content_store", |b| {
        b.iter(|| black_box(hits.concordances(ContextSize::symmetric(5), ConcordanceType::ContentStore).unwrap()));
    });
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let hits = create_test_hits(1_000, 200);
    c.bench_function("group_by_doc", |b| {
        b.iter(|| black_box(hits.group(&DocIdProperty, Some(10)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_contexts,
    bench_kwics,
    bench_concordances,
    bench_grouping
);
criterion_main!(benches);
