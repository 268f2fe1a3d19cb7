//! `/health` HTTP endpoint reporting `EmbeddingWorker` status.
//!
//! A small `axum` router bound to its own port, independent of the MCP
//! stdio transport, so orchestrators can probe liveness without speaking
//! JSON-RPC.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::embedding::EmbeddingWorker;
use crate::models::ErrorCategory;

#[derive(Debug, Serialize, serde::Deserialize)]
struct HealthResponse {
    state: &'static str,
    consecutive_failures: u32,
    success_rate: f64,
    error_patterns: HashMap<String, u64>,
    last_success_timestamp: Option<i64>,
}

async fn health_handler(State(worker): State<Arc<EmbeddingWorker>>) -> impl IntoResponse {
    let snapshot = worker.health_snapshot();
    let state = match snapshot.state {
        crate::embedding::WorkerHealthState::Healthy => "healthy",
        crate::embedding::WorkerHealthState::Degraded => "degraded",
        crate::embedding::WorkerHealthState::Critical => "critical",
    };
    let error_patterns = snapshot
        .error_patterns
        .into_iter()
        .map(|(category, count)| (category_label(category).to_string(), count))
        .collect();

    Json(HealthResponse {
        state,
        consecutive_failures: snapshot.consecutive_failures,
        success_rate: snapshot.success_rate,
        error_patterns,
        last_success_timestamp: snapshot.last_success_timestamp,
    })
}

fn category_label(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Transient => "transient",
        ErrorCategory::Permanent => "permanent",
        ErrorCategory::Critical => "critical",
    }
}

/// Builds the health router over a shared [`EmbeddingWorker`] handle.
#[must_use]
pub fn router(worker: Arc<EmbeddingWorker>) -> Router {
    Router::new().route("/health", get(health_handler)).with_state(worker)
}

/// Serves the health endpoint on `port` until the process is killed.
///
/// # Errors
///
/// Returns an error if the listener cannot bind `port`.
pub async fn serve(worker: Arc<EmbeddingWorker>, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint listening");
    axum::serve(listener, router(worker)).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower::ServiceExt;

    use super::*;
    use crate::embedding::{EmbeddingWorker, FallbackEmbedder, WorkerConfig};
    use crate::storage::sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue, SqliteVectorIndex};
    use crate::storage::traits::Similarity;

    fn worker() -> Arc<EmbeddingWorker> {
        let graph_db = GraphDatabase::in_memory().expect("opens");
        let job_db = JobDatabase::in_memory().expect("opens");
        Arc::new(EmbeddingWorker::new(
            Arc::new(SqliteGraphStore::new(&graph_db)),
            Arc::new(SqliteVectorIndex::new(&graph_db, 3, Similarity::Cosine)),
            Arc::new(SqliteJobQueue::new(&job_db)),
            Arc::new(FallbackEmbedder::new()),
            WorkerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy_by_default() {
        let app = router(worker());
        let response = app
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.state, "healthy");
        assert_eq!(parsed.consecutive_failures, 0);
    }
}
