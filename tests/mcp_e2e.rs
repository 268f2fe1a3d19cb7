//! End-to-end tests for the MCP tool surface: each test calls a
//! [`GraphMcpServer`] tool method directly and decodes the JSON text content
//! of the result, exercising the wire DTOs in `mcp::params` alongside the
//! underlying facade.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use rmcp::handler::server::tool::Parameters;
use rmcp::model::CallToolResult;

use subcog_graph::facade::{EmbedJobDefaults, KnowledgeGraph};
use subcog_graph::mcp::GraphMcpServer;
use subcog_graph::storage::sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue, SqliteVectorIndex};
use subcog_graph::storage::traits::{GraphStore, JobQueue, Similarity, VectorIndex};

fn test_server() -> GraphMcpServer {
    let graph_db = GraphDatabase::in_memory().expect("graph db opens");
    let job_db = JobDatabase::in_memory().expect("job db opens");
    let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&graph_db));
    let vector: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(&graph_db, 8, Similarity::Cosine));
    let queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(&job_db));
    let kg = Arc::new(KnowledgeGraph::new(graph, vector, queue, None, EmbedJobDefaults::default()));
    GraphMcpServer::new(kg)
}

/// Decodes the JSON value embedded in a tool result's text content block.
fn result_json(result: CallToolResult) -> serde_json::Value {
    let wire = serde_json::to_value(&result).expect("serialize call tool result");
    let text = wire["content"][0]["text"].as_str().expect("text content block").to_string();
    serde_json::from_str(&text).expect("tool result is valid json")
}

fn params<T>(value: T) -> Parameters<T> {
    Parameters(value)
}

#[tokio::test]
async fn create_entities_then_read_graph_round_trips() {
    let server = test_server();

    let created = server
        .create_entities(params(serde_json::from_value(serde_json::json!({
            "entities": [
                { "name": "Alice", "entity_type": "person", "observations": ["likes tea"] },
            ]
        })).expect("params")))
        .await
        .expect("create_entities");
    let created = result_json(created);
    assert_eq!(created[0]["name"], "Alice");
    assert_eq!(created[0]["version"], 1);

    let snapshot = server.read_graph().await.expect("read_graph");
    let snapshot = result_json(snapshot);
    assert_eq!(snapshot["entities"].as_array().expect("entities array").len(), 1);
}

#[tokio::test]
async fn create_relations_and_update_relation_round_trip() {
    let server = test_server();

    server
        .create_entities(params(serde_json::from_value(serde_json::json!({
            "entities": [
                { "name": "Alice", "entity_type": "person", "observations": [] },
                { "name": "Bob", "entity_type": "person", "observations": [] },
            ]
        })).expect("params")))
        .await
        .expect("create_entities");

    server
        .create_relations(params(serde_json::from_value(serde_json::json!({
            "relations": [
                { "from": "Alice", "to": "Bob", "relation_type": "knows", "strength": 0.5, "confidence": 0.5, "metadata": null },
            ]
        })).expect("params")))
        .await
        .expect("create_relations");

    let updated = server
        .update_relation(params(serde_json::from_value(serde_json::json!({
            "from": "Alice",
            "to": "Bob",
            "relation_type": "knows",
            "strength": 0.9,
            "confidence": 0.95,
            "metadata": null,
        })).expect("params")))
        .await
        .expect("update_relation");
    let updated = result_json(updated);
    assert_eq!(updated["strength"], 0.9);
    assert_eq!(updated["confidence"], 0.95);
    assert_eq!(updated["version"], 2);

    let fetched = server
        .get_relation(params(serde_json::from_value(serde_json::json!({
            "from": "Alice",
            "to": "Bob",
            "relation_type": "knows",
        })).expect("params")))
        .await
        .expect("get_relation");
    let fetched = result_json(fetched);
    assert_eq!(fetched["strength"], 0.9);
}

#[tokio::test]
async fn semantic_search_falls_back_to_keyword_without_embedder() {
    let server = test_server();
    server
        .create_entities(params(serde_json::from_value(serde_json::json!({
            "entities": [
                { "name": "Alice", "entity_type": "person", "observations": ["loves databases"] },
            ]
        })).expect("params")))
        .await
        .expect("create_entities");

    let outcome = server
        .semantic_search(params(serde_json::from_value(serde_json::json!({
            "query": "Alice",
            "search_type": "semantic",
        })).expect("params")))
        .await
        .expect("semantic_search");
    let outcome = result_json(outcome);
    assert_eq!(outcome["diagnostics"]["actual_search_type"], "keyword");
    assert_eq!(outcome["results"].as_array().expect("results array").len(), 1);
}

#[tokio::test]
async fn delete_entities_removes_current_relations() {
    let server = test_server();
    server
        .create_entities(params(serde_json::from_value(serde_json::json!({
            "entities": [
                { "name": "Alice", "entity_type": "person", "observations": [] },
                { "name": "Bob", "entity_type": "person", "observations": [] },
            ]
        })).expect("params")))
        .await
        .expect("create_entities");
    server
        .create_relations(params(serde_json::from_value(serde_json::json!({
            "relations": [
                { "from": "Alice", "to": "Bob", "relation_type": "knows", "strength": null, "confidence": null, "metadata": null },
            ]
        })).expect("params")))
        .await
        .expect("create_relations");

    server
        .delete_entities(params(serde_json::from_value(serde_json::json!({ "names": ["Bob"] })).expect("params")))
        .await
        .expect("delete_entities");

    let snapshot = result_json(server.read_graph().await.expect("read_graph"));
    assert!(snapshot["relations"].as_array().expect("relations array").is_empty());
}

#[tokio::test]
async fn get_entity_history_reflects_observation_merges() {
    let server = test_server();
    server
        .create_entities(params(serde_json::from_value(serde_json::json!({
            "entities": [
                { "name": "Alice", "entity_type": "person", "observations": ["likes tea"] },
            ]
        })).expect("params")))
        .await
        .expect("create_entities");
    server
        .add_observations(params(serde_json::from_value(serde_json::json!({
            "observations": [
                { "entity_name": "Alice", "contents": ["likes coffee"] },
            ]
        })).expect("params")))
        .await
        .expect("add_observations");

    let history = result_json(
        server
            .get_entity_history(params(serde_json::from_value(serde_json::json!({ "name": "Alice" })).expect("params")))
            .await
            .expect("get_entity_history"),
    );
    let history = history.as_array().expect("history array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["version"], 2);
}
