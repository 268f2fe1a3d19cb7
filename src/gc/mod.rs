//! Retention sweeps: periodic purges of archived graph rows and terminal
//! job-queue entries past their retention window.
//!
//! Soft-deleted entities/relations and completed/failed jobs are kept around
//! so bitemporal history and recent job outcomes stay queryable for a while,
//! but they are not kept forever. [`RetentionSweeper`] is the background
//! task that enforces that.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::storage::traits::{GraphStore, JobQueue};
use crate::{Error, Result};

/// Tuning knobs for a [`RetentionSweeper`].
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Archived entity/relation rows older than this (in days) are purged.
    pub archive_retention_days: u32,
    /// Terminal job-queue rows older than this (in days) are purged.
    pub job_retention_days: u32,
}

impl RetentionConfig {
    /// Builds a config tying the archive retention window to the job
    /// retention window, since neither is separately specified in the
    /// external configuration surface.
    #[must_use]
    pub const fn new(interval: Duration, retention_days: u32) -> Self {
        Self {
            interval,
            archive_retention_days: retention_days,
            job_retention_days: retention_days,
        }
    }
}

/// Runs [`GraphStore`] archive purges and [`JobQueue`] cleanup on an interval.
pub struct RetentionSweeper {
    graph: Arc<dyn GraphStore>,
    queue: Arc<dyn JobQueue>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    /// Builds a sweeper over the given backends.
    #[must_use]
    pub const fn new(graph: Arc<dyn GraphStore>, queue: Arc<dyn JobQueue>, config: RetentionConfig) -> Self {
        Self { graph, queue, config }
    }

    /// Runs the sweep loop until `cancellation` fires.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                () = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "retention sweep failed");
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn sweep_once(&self) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let archive_cutoff = crate::models::temporal::current_timestamp()
            - i64::from(self.config.archive_retention_days) * 86_400;
        let (entities_purged, relations_purged) = tokio::task::spawn_blocking(move || {
            let entities = graph.purge_archived_entities(archive_cutoff)?;
            let relations = graph.purge_archived_relations(archive_cutoff)?;
            Ok::<_, Error>((entities, relations))
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "retention_sweep_join".to_string(),
            cause: e.to_string(),
        })??;

        let queue = Arc::clone(&self.queue);
        let job_cutoff_days = self.config.job_retention_days;
        let jobs_purged = tokio::task::spawn_blocking(move || queue.cleanup(job_cutoff_days))
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "job_cleanup_join".to_string(),
                cause: e.to_string(),
            })??;

        if entities_purged > 0 || relations_purged > 0 || jobs_purged > 0 {
            info!(entities_purged, relations_purged, jobs_purged, "retention sweep completed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue};

    #[tokio::test]
    async fn sweep_once_runs_without_error_on_empty_stores() {
        let graph_db = GraphDatabase::in_memory().expect("opens");
        let job_db = JobDatabase::in_memory().expect("opens");
        let sweeper = RetentionSweeper::new(
            Arc::new(SqliteGraphStore::new(&graph_db)),
            Arc::new(SqliteJobQueue::new(&job_db)),
            RetentionConfig::new(Duration::from_secs(60), 7),
        );
        sweeper.sweep_once().await.expect("ok");
    }
}
