//! `SQLite`-backed [`JobQueue`]: the durable embedding job queue.
//!
//! Lives in its own database file, isolated from the graph store, so a
//! busy embedding worker never contends with graph reads/writes over the
//! same connection.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::{EmbedJob, ErrorCategory, JobStatus, current_timestamp};
use crate::storage::traits::{FailureContext, JobQueue, QueueStatus};
use crate::{Error, Result};

use super::record_operation_metrics;
use super::schema::JobDatabase;
use super::acquire_lock;

/// `SQLite`-backed [`JobQueue`].
pub struct SqliteJobQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobQueue {
    /// Builds a job queue over an already-initialized [`JobDatabase`].
    #[must_use]
    pub fn new(db: &JobDatabase) -> Self {
        Self {
            conn: db.connection(),
        }
    }
}

impl JobQueue for SqliteJobQueue {
    #[instrument(skip(self))]
    fn enqueue(
        &self,
        entity_uid: &str,
        model: &str,
        version: &str,
        priority: i32,
        max_attempts: u32,
    ) -> Result<Option<Uuid>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);

        let existing: Option<(String, String)> = conn
            .query_row(
                "SELECT id, status FROM embed_jobs WHERE entity_uid = ?1 AND model = ?2 AND version = ?3",
                params![entity_uid, model, version],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(op_err("enqueue_lookup"))?;

        let Some((id, status)) = existing else {
            let job = EmbedJob::new(entity_uid, model, version, priority, max_attempts);
            insert_job(&conn, &job)?;
            record_operation_metrics("sqlite_job_queue", "enqueue", start, "inserted");
            return Ok(Some(job.id));
        };

        if status != JobStatus::Failed.as_str() {
            return Ok(None);
        }

        let job_id = Uuid::parse_str(&id).map_err(|e| Error::OperationFailed {
            operation: "parse_job_id".to_string(),
            cause: e.to_string(),
        })?;
        conn.execute(
            "UPDATE embed_jobs SET status = ?1, priority = ?2, max_attempts = ?3, attempts = 0,
                lock_owner = NULL, lock_until = NULL, error = NULL, error_category = NULL,
                error_stack = NULL, permanent = 0, processed_at = NULL
             WHERE id = ?4",
            params![JobStatus::Pending.as_str(), priority, max_attempts, id],
        )
        .map_err(op_err("requeue_failed_job"))?;
        record_operation_metrics("sqlite_job_queue", "enqueue", start, "requeued");
        Ok(Some(job_id))
    }

    #[instrument(skip(self))]
    fn lease(&self, batch_size: u32, worker_id: &str, lock_duration_ms: i64) -> Result<Vec<EmbedJob>> {
        let start = Instant::now();
        let mut conn = acquire_lock(&self.conn);
        let now_ms = crate::current_timestamp_ms();
        let tx = conn.transaction().map_err(op_err("begin_lease_tx"))?;

        let candidate_ids: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id FROM embed_jobs
                     WHERE status = 'pending' OR (status = 'processing' AND lock_until < ?1)
                     ORDER BY priority DESC, created_at ASC
                     LIMIT ?2",
                )
                .map_err(op_err("prepare_lease_select"))?;
            let rows = stmt
                .query_map(params![now_ms, batch_size], |row| row.get(0))
                .map_err(op_err("query_lease_candidates"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(op_err("collect_lease_candidates"))?
        };

        if candidate_ids.is_empty() {
            tx.commit().map_err(op_err("commit_empty_lease"))?;
            return Ok(Vec::new());
        }

        let lock_until = now_ms + lock_duration_ms;
        let placeholders = candidate_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let update_sql = format!(
            "UPDATE embed_jobs SET status = 'processing', lock_owner = ?, lock_until = ?, attempts = attempts + 1
             WHERE id IN ({placeholders})"
        );
        let mut update_params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(worker_id.to_string()), Box::new(lock_until)];
        update_params.extend(candidate_ids.iter().cloned().map(|id| Box::new(id) as Box<dyn rusqlite::ToSql>));
        tx.execute(&update_sql, params_from_iter(update_params.iter().map(std::convert::AsRef::as_ref)))
            .map_err(op_err("lease_update"))?;

        let select_sql = format!("SELECT * FROM embed_jobs WHERE id IN ({placeholders})");
        let leased: Vec<EmbedJob> = {
            let mut stmt = tx.prepare(&select_sql).map_err(op_err("prepare_lease_fetch"))?;
            let rows = stmt
                .query_map(params_from_iter(candidate_ids.iter()), parse_job_row)
                .map_err(op_err("query_lease_fetch"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(op_err("collect_leased_jobs"))?
        };

        tx.commit().map_err(op_err("commit_lease"))?;
        record_operation_metrics("sqlite_job_queue", "lease", start, "success");
        Ok(leased)
    }

    #[instrument(skip(self, job_ids))]
    fn heartbeat(&self, job_ids: &[Uuid], worker_id: &str, lock_duration_ms: i64) -> Result<u64> {
        if job_ids.is_empty() {
            return Ok(0);
        }
        let conn = acquire_lock(&self.conn);
        let now_ms = crate::current_timestamp_ms();
        let lock_until = now_ms + lock_duration_ms;
        let placeholders = job_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE embed_jobs SET lock_until = ?
             WHERE lock_owner = ? AND status = 'processing' AND id IN ({placeholders})"
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(lock_until), Box::new(worker_id.to_string())];
        bound.extend(job_ids.iter().map(|id| Box::new(id.to_string()) as Box<dyn rusqlite::ToSql>));
        let affected = conn
            .execute(&sql, params_from_iter(bound.iter().map(std::convert::AsRef::as_ref)))
            .map_err(op_err("heartbeat"))?;
        Ok(affected as u64)
    }

    #[instrument(skip(self, job_ids))]
    fn release(&self, job_ids: &[Uuid], worker_id: &str) -> Result<u64> {
        if job_ids.is_empty() {
            return Ok(0);
        }
        let conn = acquire_lock(&self.conn);
        let placeholders = job_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE embed_jobs SET status = 'pending', lock_owner = NULL, lock_until = NULL
             WHERE lock_owner = ? AND id IN ({placeholders})"
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(worker_id.to_string())];
        bound.extend(job_ids.iter().map(|id| Box::new(id.to_string()) as Box<dyn rusqlite::ToSql>));
        let affected = conn
            .execute(&sql, params_from_iter(bound.iter().map(std::convert::AsRef::as_ref)))
            .map_err(op_err("release"))?;
        Ok(affected as u64)
    }

    #[instrument(skip(self))]
    fn recover_stale(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        let now_ms = crate::current_timestamp_ms();
        let affected = conn
            .execute(
                "UPDATE embed_jobs SET status = 'pending', lock_owner = NULL, lock_until = NULL
                 WHERE status = 'processing' AND lock_until < ?1",
                params![now_ms],
            )
            .map_err(op_err("recover_stale"))?;
        if affected > 0 {
            warn!(recovered = affected, "recovered stale job leases");
        }
        Ok(affected as u64)
    }

    #[instrument(skip(self))]
    fn complete(&self, job_id: Uuid, worker_id: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let now = current_timestamp();
        let affected = conn
            .execute(
                "UPDATE embed_jobs SET status = 'completed', processed_at = ?1, lock_owner = NULL, lock_until = NULL
                 WHERE id = ?2 AND lock_owner = ?3 AND status = 'processing'",
                params![now, job_id.to_string(), worker_id],
            )
            .map_err(op_err("complete"))?;
        if affected == 0 {
            warn!(job_id = %job_id, worker = %worker_id, "complete: job not held by this worker");
        }
        Ok(())
    }

    #[instrument(skip(self, ctx))]
    fn fail(&self, job_id: Uuid, worker_id: &str, ctx: FailureContext) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let job: Option<EmbedJob> = conn
            .query_row(
                "SELECT * FROM embed_jobs WHERE id = ?1 AND lock_owner = ?2",
                params![job_id.to_string(), worker_id],
                parse_job_row,
            )
            .optional()
            .map_err(op_err("fail_lookup"))?;

        let Some(job) = job else {
            warn!(job_id = %job_id, worker = %worker_id, "fail: job not held by this worker");
            return Ok(());
        };

        let permanent = job.exhausts_retries() || ctx.category == ErrorCategory::Critical;
        let now = current_timestamp();

        if permanent {
            conn.execute(
                "UPDATE embed_jobs SET status = 'failed', processed_at = ?1, lock_owner = NULL, lock_until = NULL,
                    error = ?2, error_category = ?3, error_stack = ?4, permanent = 1
                 WHERE id = ?5",
                params![now, ctx.error, ctx.category.as_str(), ctx.error_stack, job_id.to_string()],
            )
            .map_err(op_err("fail_permanent"))?;
        } else {
            conn.execute(
                "UPDATE embed_jobs SET status = 'pending', lock_owner = NULL, lock_until = NULL,
                    error = ?1, error_category = ?2, error_stack = ?3
                 WHERE id = ?4",
                params![ctx.error, ctx.category.as_str(), ctx.error_stack, job_id.to_string()],
            )
            .map_err(op_err("fail_retry"))?;
        }
        Ok(())
    }

    fn retry_failed(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute(
                "UPDATE embed_jobs SET status = 'pending', attempts = 0, processed_at = NULL,
                    error = NULL, error_category = NULL, error_stack = NULL, permanent = 0
                 WHERE status = 'failed'",
                [],
            )
            .map_err(op_err("retry_failed"))?;
        Ok(affected as u64)
    }

    #[instrument(skip(self))]
    fn cleanup(&self, retention_days: u32) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        let cutoff = current_timestamp() - i64::from(retention_days) * 86_400;
        let affected = conn
            .execute(
                "DELETE FROM embed_jobs WHERE status IN ('completed', 'failed') AND processed_at < ?1",
                params![cutoff],
            )
            .map_err(op_err("cleanup"))?;
        Ok(affected as u64)
    }

    fn queue_status(&self) -> Result<QueueStatus> {
        let conn = acquire_lock(&self.conn);
        let mut status = QueueStatus::default();
        let mut stmt = conn
            .prepare("SELECT status, count(*) FROM embed_jobs GROUP BY status")
            .map_err(op_err("prepare_queue_status"))?;
        let rows = stmt
            .query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count as u64))
            })
            .map_err(op_err("query_queue_status"))?;
        for row in rows {
            let (state, count) = row.map_err(op_err("read_queue_status_row"))?;
            match state.as_str() {
                "pending" => status.pending = count,
                "processing" => status.processing = count,
                "completed" => status.completed = count,
                "failed" => status.failed = count,
                _ => {},
            }
            status.total += count;
        }
        Ok(status)
    }
}

fn op_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn insert_job(conn: &Connection, job: &EmbedJob) -> Result<()> {
    conn.execute(
        "INSERT INTO embed_jobs
            (id, entity_uid, model, version, status, priority, created_at, processed_at,
             attempts, max_attempts, lock_owner, lock_until, error, error_category, error_stack, permanent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            job.id.to_string(),
            job.entity_uid,
            job.model,
            job.version,
            job.status.as_str(),
            job.priority,
            job.created_at,
            job.processed_at,
            job.attempts,
            job.max_attempts,
            job.lock_owner,
            job.lock_until,
            job.error,
            job.error_category.map(ErrorCategory::as_str),
            job.error_stack,
            job.permanent,
        ],
    )
    .map_err(op_err("insert_job"))?;
    Ok(())
}

fn parse_job_row(row: &Row<'_>) -> rusqlite::Result<EmbedJob> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    let error_category: Option<String> = row.get("error_category")?;
    Ok(EmbedJob {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        entity_uid: row.get("entity_uid")?,
        model: row.get("model")?,
        version: row.get("version")?,
        status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
        priority: row.get("priority")?,
        created_at: row.get("created_at")?,
        processed_at: row.get("processed_at")?,
        attempts: row.get("attempts")?,
        max_attempts: row.get("max_attempts")?,
        lock_owner: row.get("lock_owner")?,
        lock_until: row.get("lock_until")?,
        error: row.get("error")?,
        error_category: error_category.and_then(|c| ErrorCategory::parse(&c)),
        error_stack: row.get("error_stack")?,
        permanent: row.get("permanent")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> SqliteJobQueue {
        let db = JobDatabase::in_memory().expect("opens");
        SqliteJobQueue::new(&db)
    }

    #[test]
    fn enqueue_is_idempotent_for_active_jobs() {
        let q = queue();
        let first = q.enqueue("Alice", "text-embedding-3-small", "1", 0, 3).expect("ok");
        assert!(first.is_some());
        let second = q.enqueue("Alice", "text-embedding-3-small", "1", 0, 3).expect("ok");
        assert!(second.is_none());
    }

    #[test]
    fn lease_is_exclusive_across_callers() {
        let q = queue();
        q.enqueue("Alice", "model", "1", 0, 3).expect("ok");
        q.enqueue("Bob", "model", "1", 0, 3).expect("ok");

        let leased_a = q.lease(10, "worker-a", 30_000).expect("ok");
        assert_eq!(leased_a.len(), 2);
        let leased_b = q.lease(10, "worker-b", 30_000).expect("ok");
        assert!(leased_b.is_empty());
    }

    #[test]
    fn fail_retries_until_attempts_exhausted_then_becomes_permanent() {
        let q = queue();
        q.enqueue("Alice", "model", "1", 0, 2).expect("ok");
        let job = q.lease(1, "worker-a", 30_000).expect("ok").remove(0);

        q.fail(
            job.id,
            "worker-a",
            FailureContext {
                error: "timeout".into(),
                category: ErrorCategory::Transient,
                error_stack: None,
            },
        )
        .expect("ok");

        let status = q.queue_status().expect("ok");
        assert_eq!(status.pending, 1);

        let job = q.lease(1, "worker-a", 30_000).expect("ok").remove(0);
        q.fail(
            job.id,
            "worker-a",
            FailureContext {
                error: "timeout again".into(),
                category: ErrorCategory::Transient,
                error_stack: None,
            },
        )
        .expect("ok");

        let status = q.queue_status().expect("ok");
        assert_eq!(status.failed, 1);
    }

    #[test]
    fn recover_stale_reclaims_expired_leases() {
        let q = queue();
        q.enqueue("Alice", "model", "1", 0, 3).expect("ok");
        q.lease(1, "worker-a", -1).expect("ok");

        let recovered = q.recover_stale().expect("ok");
        assert_eq!(recovered, 1);
        let status = q.queue_status().expect("ok");
        assert_eq!(status.pending, 1);
    }

    #[test]
    fn cleanup_removes_only_old_terminal_jobs() {
        let q = queue();
        q.enqueue("Alice", "model", "1", 0, 3).expect("ok");
        let job = q.lease(1, "worker-a", 30_000).expect("ok").remove(0);
        q.complete(job.id, "worker-a").expect("ok");

        let removed = q.cleanup(0).expect("ok");
        assert_eq!(removed, 0, "processed just now, not older than retention cutoff");
    }
}
