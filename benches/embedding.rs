//! Benchmarks for the embedding pipeline: a deterministic bench-only
//! embedder, the vector index's insert/search path, and the rate limiter
//! that gates calls to the real embedding provider.

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use subcog_graph::storage::sqlite::{GraphDatabase, SqliteGraphStore, SqliteVectorIndex};
use subcog_graph::storage::traits::{EntityInput, GraphStore, Similarity, VectorIndex};

const DIMENSIONS: usize = 384;

/// Deterministic, hash-based embedder standing in for a real provider:
/// fast enough to benchmark the surrounding pipeline without a network call.
fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSIONS];
    for (i, byte) in text.bytes().enumerate() {
        let slot = (i + byte as usize) % DIMENSIONS;
        vector[slot] += f32::from(byte) / 255.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn bench_hash_embed(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding_hash_embed");
    group.throughput(Throughput::Elements(1));
    group.bench_function("short_text", |b| {
        b.iter(|| hash_embed(black_box("database storage")));
    });
    group.bench_function("long_text", |b| {
        b.iter(|| {
            hash_embed(black_box(
                "I'm building a web application that needs OAuth2 authentication \
                 across Google, GitHub, and Microsoft, with proper token refresh.",
            ))
        });
    });
    group.finish();
}

fn populated_index(count: usize) -> (GraphDatabase, SqliteVectorIndex) {
    let db = GraphDatabase::in_memory().expect("opens");
    let graph = SqliteGraphStore::new(&db);
    let vector = SqliteVectorIndex::new(&db, DIMENSIONS, Similarity::Cosine);

    for i in 0..count {
        let name = format!("entity-{i}");
        graph
            .create_entities(vec![EntityInput {
                name: name.clone(),
                entity_type: "bench".to_string(),
                observations: vec![format!("observation for {name}")],
            }])
            .expect("create entity");
        vector.upsert(&name, &hash_embed(&name), "bench-model").expect("upsert");
    }
    (db, vector)
}

fn bench_vector_upsert(c: &mut Criterion) {
    let (_db, vector) = populated_index(1_000);
    let query_vector = hash_embed("query");

    c.bench_function("vector_upsert_single", |b| {
        b.iter(|| vector.upsert(black_box("entity-0"), black_box(&query_vector), "bench-model").expect("upsert"));
    });
}

fn bench_vector_search_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding_vector_search_scaling");
    group.measurement_time(Duration::from_secs(10));

    for count in [100, 1_000, 5_000] {
        let (_db, vector) = populated_index(count);
        let query_vector = hash_embed("microservices architecture");

        group.bench_with_input(BenchmarkId::new("search_top10", count), &count, |b, _| {
            b.iter(|| vector.search(black_box(&query_vector), 10, 0.0).expect("search"));
        });
    }

    group.finish();
}

fn bench_rate_limiter(c: &mut Criterion) {
    use subcog_graph::embedding::RateLimiter;

    let limiter = RateLimiter::new(1_000_000, Duration::from_secs(60));
    c.bench_function("rate_limiter_try_consume", |b| {
        b.iter(|| black_box(limiter.try_consume()));
    });
}

criterion_group!(
    benches,
    bench_hash_embed,
    bench_vector_upsert,
    bench_vector_search_scaling,
    bench_rate_limiter,
);
criterion_main!(benches);
