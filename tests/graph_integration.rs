//! End-to-end tests for the knowledge-graph facade: bitemporal entity
//! versioning, relation lifecycle, and search, all exercised through
//! [`KnowledgeGraph`] rather than the storage traits directly.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use subcog_graph::facade::{EmbedJobDefaults, KnowledgeGraph};
use subcog_graph::search::{SearchOptions, SearchType};
use subcog_graph::storage::sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue, SqliteVectorIndex};
use subcog_graph::storage::traits::{
    DecayOptions, EntityInput, GraphStore, JobQueue, ObservationDelta, RelationInput, RelationKey, Similarity,
    VectorIndex,
};

fn test_graph() -> KnowledgeGraph {
    let graph_db = GraphDatabase::in_memory().expect("graph db opens");
    let job_db = JobDatabase::in_memory().expect("job db opens");
    let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&graph_db));
    let vector: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(&graph_db, 8, Similarity::Cosine));
    let queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(&job_db));
    KnowledgeGraph::new(graph, vector, queue, None, EmbedJobDefaults::default())
}

#[tokio::test]
async fn create_then_version_entity_preserves_history() {
    let graph = test_graph();

    let created = graph
        .create_entities(vec![EntityInput {
            name: "Alice".to_string(),
            entity_type: "person".to_string(),
            observations: vec!["likes tea".to_string()],
        }])
        .await
        .expect("create");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].version, 1);

    let added = graph
        .add_observations(vec![ObservationDelta {
            entity_name: "Alice".to_string(),
            contents: vec!["likes coffee".to_string()],
        }])
        .await
        .expect("add observations");
    assert_eq!(added[0].added_observations, vec!["likes coffee".to_string()]);

    let history = graph.get_entity_history("Alice".to_string()).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 1);
    assert_eq!(history[1].version, 2);
    assert!(history[1].valid_to.is_none());
}

#[tokio::test]
async fn relations_require_current_endpoints() {
    let graph = test_graph();
    graph
        .create_entities(vec![
            EntityInput {
                name: "Alice".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
            EntityInput {
                name: "Bob".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
        ])
        .await
        .expect("create");

    let relations = graph
        .create_relations(vec![RelationInput {
            from: "Alice".to_string(),
            to: "Bob".to_string(),
            relation_type: "knows".to_string(),
            strength: Some(0.8),
            confidence: Some(0.9),
            metadata: Default::default(),
        }])
        .await
        .expect("create relations");
    assert_eq!(relations.len(), 1);

    graph
        .delete_entities(vec!["Bob".to_string()])
        .await
        .expect("delete entity");

    // With Bob archived, the relation is no longer current and the graph
    // snapshot must not contain it: no phantom relations.
    let snapshot = graph.load_graph().await.expect("load graph");
    assert!(snapshot.relations.is_empty());

    let missing = graph
        .get_relation("Alice".to_string(), "Bob".to_string(), "knows".to_string())
        .await
        .expect("lookup");
    assert!(missing.is_none());
}

#[tokio::test]
async fn delete_relations_by_key_archives_current_edge() {
    let graph = test_graph();
    graph
        .create_entities(vec![
            EntityInput {
                name: "Alice".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
            EntityInput {
                name: "Bob".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
        ])
        .await
        .expect("create");
    graph
        .create_relations(vec![RelationInput {
            from: "Alice".to_string(),
            to: "Bob".to_string(),
            relation_type: "knows".to_string(),
            strength: None,
            confidence: None,
            metadata: Default::default(),
        }])
        .await
        .expect("create relations");

    graph
        .delete_relations(vec![RelationKey {
            from: "Alice".to_string(),
            to: "Bob".to_string(),
            relation_type: "knows".to_string(),
        }])
        .await
        .expect("delete relations");

    let missing = graph
        .get_relation("Alice".to_string(), "Bob".to_string(), "knows".to_string())
        .await
        .expect("lookup");
    assert!(missing.is_none());
}

#[tokio::test]
async fn decayed_graph_reduces_old_relation_confidence() {
    let graph = test_graph();
    graph
        .create_entities(vec![
            EntityInput {
                name: "Alice".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
            EntityInput {
                name: "Bob".to_string(),
                entity_type: "person".to_string(),
                observations: vec![],
            },
        ])
        .await
        .expect("create");
    graph
        .create_relations(vec![RelationInput {
            from: "Alice".to_string(),
            to: "Bob".to_string(),
            relation_type: "knows".to_string(),
            strength: None,
            confidence: Some(1.0),
            metadata: Default::default(),
        }])
        .await
        .expect("create relations");

    let decayed = graph
        .get_decayed_graph(DecayOptions {
            half_life_days: 30.0,
            min_floor: 0.0,
        })
        .await
        .expect("decayed graph");
    assert_eq!(decayed.relations.len(), 1);
    // A freshly created relation is at age zero, so decay should not yet
    // have reduced its confidence.
    assert!(decayed.relations[0].decayed_confidence.unwrap() > 0.99);
}

#[tokio::test]
async fn keyword_search_falls_back_without_embedder() {
    let graph = test_graph();
    graph
        .create_entities(vec![EntityInput {
            name: "Alice".to_string(),
            entity_type: "person".to_string(),
            observations: vec!["loves databases".to_string()],
        }])
        .await
        .expect("create");

    let outcome = graph
        .semantic_search(
            "Alice".to_string(),
            SearchOptions {
                requested: SearchType::Semantic,
                ..Default::default()
            },
        )
        .await
        .expect("search");
    assert_eq!(outcome.diagnostics.actual_search_type, SearchType::Keyword);
    assert_eq!(outcome.results.len(), 1);
}
