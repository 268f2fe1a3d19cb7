//! `serve` command: boots every backend, then runs the MCP server on stdio
//! alongside the embedding worker, retention sweeper, and `/health` listener
//! as background tasks.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use crate::embedding::{EmbeddingWorker, HttpEmbedder, WorkerConfig};
use crate::facade::{EmbedJobDefaults, KnowledgeGraph};
use crate::gc::{RetentionConfig, RetentionSweeper};
use crate::storage::sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue, SqliteVectorIndex};
use crate::storage::traits::{GraphStore, JobQueue, VectorIndex};
use crate::{Embedder, Error, GraphConfig, Result};

/// Runs the knowledge-graph service until the process is interrupted.
///
/// # Errors
///
/// Returns an error if a database fails to open or the MCP transport fails
/// to start.
pub async fn execute(config: GraphConfig) -> Result<()> {
    crate::observability::init(&config.log_format, &config.log_level, config.metrics_port)?;

    let graph_db = GraphDatabase::open(config.graph_db_path())?;
    let job_db = JobDatabase::open(config.job_db_path())?;

    let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&graph_db));
    let vector: Arc<dyn VectorIndex> =
        Arc::new(SqliteVectorIndex::new(&graph_db, config.vector_dimensions, config.similarity));
    let queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(&job_db));

    let embedder: Option<Arc<dyn Embedder>> = config.embedding_provider_api_key.as_ref().map(|key| {
        Arc::new(HttpEmbedder::new(
            config.embedding_provider_endpoint.clone(),
            secrecy::SecretString::from(key.expose_secret().to_string()),
            config.embedding_model.clone(),
            config.vector_dimensions,
        )) as Arc<dyn Embedder>
    });

    let embed_job_defaults = EmbedJobDefaults {
        model: config.embedding_model.clone(),
        max_attempts: config.embed_job_max_retries,
        ..EmbedJobDefaults::default()
    };
    let kg = Arc::new(KnowledgeGraph::new(
        Arc::clone(&graph),
        Arc::clone(&vector),
        Arc::clone(&queue),
        embedder.clone(),
        embed_job_defaults,
    ));

    let cancellation = CancellationToken::new();
    let mut background_tasks = Vec::new();

    if let Some(embedder) = embedder {
        let worker_config = WorkerConfig {
            lock_duration_ms: config.embed_job_lock_duration_ms,
            heartbeat_interval_ms: config.embed_job_heartbeat_interval_ms,
            recovery_interval_ms: config.embed_job_recovery_interval_ms,
            rate_limit_tokens: config.embedding_rate_limit_tokens,
            rate_limit_interval: std::time::Duration::from_millis(config.embedding_rate_limit_interval_ms),
            ..WorkerConfig::default()
        };
        let worker = Arc::new(EmbeddingWorker::new(
            Arc::clone(&graph),
            Arc::clone(&vector),
            Arc::clone(&queue),
            embedder,
            worker_config,
        ));

        let run_token = cancellation.clone();
        let health_worker = Arc::clone(&worker);
        background_tasks.push(tokio::spawn(async move { worker.run(run_token).await }));

        let health_port = config.health_port;
        background_tasks.push(tokio::spawn(async move {
            if let Err(e) = crate::health::serve(health_worker, health_port).await {
                tracing::error!(error = %e, "health endpoint exited");
            }
        }));
    } else {
        tracing::warn!("no embedding provider configured; running in keyword-search-only mode");
    }

    let sweeper = Arc::new(RetentionSweeper::new(
        graph,
        queue,
        RetentionConfig::new(std::time::Duration::from_secs(3600), config.embed_job_retention_days),
    ));
    let sweep_token = cancellation.clone();
    background_tasks.push(tokio::spawn(async move { sweeper.run(sweep_token).await }));

    let ctrlc_token = cancellation.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel()).map_err(|e| Error::OperationFailed {
        operation: "install_ctrlc_handler".to_string(),
        cause: e.to_string(),
    })?;

    let serve_result = crate::mcp::serve_stdio(kg).await;
    cancellation.cancel();
    for task in background_tasks {
        task.abort();
    }
    serve_result
}
