use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lexstore::{Document, Engine, EngineConfig, Filter, SearchRequest};

const VOCABULARY: &[&str] = &[
    "rust", "search", "index", "engine", "query", "token", "score", "filter", "metadata",
    "document", "posting", "term", "frequency", "length", "average", "corpus", "ranking",
    "snapshot", "flush", "batch", "update", "delete", "analyzer", "unicode", "word",
];

// Deterministic pseudo-random text so runs are comparable.
fn generate_documents(count: usize, words_per_doc: usize) -> Vec<Document> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    (0..count)
        .map(|i| {
            let text: Vec<&str> = (0..words_per_doc)
                .map(|_| VOCABULARY[(next() % VOCABULARY.len() as u64) as usize])
                .collect();
            Document::new_with_id(format!("doc_{i:06}"), text.join(" "))
                .add_field("year", 2000 + (i % 25) as i64)
                .add_field("lang", if i % 3 == 0 { "en" } else { "de" })
        })
        .collect()
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Indexing");
    group.sample_size(10);

    for count in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let docs = generate_documents(count, 40);
            b.iter(|| {
                let engine = Engine::new(EngineConfig::default()).unwrap();
                engine.add_batch(docs.clone()).unwrap();
                black_box(engine.len())
            })
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Search");

    let engine = Engine::new(EngineConfig::default()).unwrap();
    engine.add_batch(generate_documents(10_000, 40)).unwrap();

    let plain = SearchRequest::builder("rust search ranking").k(10).build();
    let filtered = SearchRequest::builder("rust search ranking")
        .filter(Filter::parse(r#"{"year": {"$gte": 2015}, "lang": "en"}"#).unwrap())
        .k(10)
        .build();

    group.bench_function("unfiltered", |b| {
        b.iter(|| black_box(engine.search(black_box(&plain)).unwrap()))
    });
    group.bench_function("filtered", |b| {
        b.iter(|| black_box(engine.search(black_box(&filtered)).unwrap()))
    });

    let batch: Vec<SearchRequest> = VOCABULARY
        .iter()
        .map(|word| SearchRequest::builder(*word).k(10).build())
        .collect();
    group.bench_function("batch", |b| {
        b.iter(|| black_box(engine.search_batch(black_box(&batch)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_indexing, bench_search);
criterion_main!(benches);
