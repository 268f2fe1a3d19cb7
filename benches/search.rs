//! Benchmarks for `SearchService`: keyword, semantic, and hybrid search at
//! increasing graph sizes.

#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use subcog_graph::search::{SearchOptions, SearchService, SearchType};
use subcog_graph::storage::sqlite::{GraphDatabase, SqliteGraphStore, SqliteVectorIndex};
use subcog_graph::storage::traits::{EntityInput, GraphStore, Similarity, VectorIndex};
use subcog_graph::{Embedder, Result};

const DIMENSIONS: usize = 64;

/// Deterministic embedder so semantic/hybrid paths are exercised without a
/// network call.
struct BenchEmbedder;

impl Embedder for BenchEmbedder {
    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; DIMENSIONS];
        for (i, byte) in text.bytes().enumerate() {
            vector[(i + byte as usize) % DIMENSIONS] += 1.0;
        }
        Ok(vector)
    }
}

const SAMPLE_CONTENT: &[&str] = &[
    "PostgreSQL database configuration with connection pooling",
    "Redis caching layer implementation with TTL",
    "JWT authentication token validation flow",
    "Microservices architecture with event sourcing",
    "Kubernetes deployment configuration with autoscaling",
    "GraphQL API design patterns and best practices",
    "Docker container orchestration strategies",
    "CI/CD pipeline with GitHub Actions",
    "Performance optimization for Node.js applications",
    "Security audit checklist for web applications",
];

fn populated_service(count: usize, with_embedder: bool) -> (GraphDatabase, SearchService) {
    let db = GraphDatabase::in_memory().expect("opens");
    let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&db));
    let vector: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(&db, DIMENSIONS, Similarity::Cosine));
    let embedder: Option<Arc<dyn Embedder>> = with_embedder.then(|| Arc::new(BenchEmbedder) as Arc<dyn Embedder>);

    for i in 0..count {
        let content = SAMPLE_CONTENT[i % SAMPLE_CONTENT.len()];
        let name = format!("entity-{i}");
        let entity = graph
            .create_entities(vec![EntityInput {
                name: name.clone(),
                entity_type: "bench".to_string(),
                observations: vec![content.to_string()],
            }])
            .expect("create entity")
            .pop()
            .expect("created");
        if let Some(embedder) = &embedder {
            let embedding = embedder.embed(content).expect("embed");
            vector.upsert(&entity.name, &embedding, "bench-model").expect("upsert");
        }
    }

    (db, SearchService::new(graph, vector, embedder))
}

fn bench_keyword_search_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_keyword_scaling");
    group.measurement_time(Duration::from_secs(10));

    for count in [100, 1_000, 10_000] {
        let (_db, service) = populated_service(count, false);
        group.bench_with_input(BenchmarkId::new("keyword", count), &count, |b, _| {
            b.iter(|| {
                service
                    .search(
                        "database",
                        &SearchOptions {
                            requested: SearchType::Keyword,
                            ..Default::default()
                        },
                    )
                    .expect("search")
            });
        });
    }

    group.finish();
}

fn bench_search_modes(c: &mut Criterion) {
    let (_db, service) = populated_service(500, true);

    let mut group = c.benchmark_group("search_modes");
    group.measurement_time(Duration::from_secs(10));

    for (label, search_type) in [
        ("keyword", SearchType::Keyword),
        ("semantic", SearchType::Semantic),
        ("hybrid", SearchType::Hybrid),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                service
                    .search(
                        "microservices architecture",
                        &SearchOptions {
                            requested: search_type,
                            ..Default::default()
                        },
                    )
                    .expect("search")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_keyword_search_scaling, bench_search_modes);
criterion_main!(benches);
