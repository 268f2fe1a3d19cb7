//! `JobQueue` trait: the durable embedding-job queue's public contract.

use uuid::Uuid;

use crate::Result;
use crate::models::{EmbedJob, ErrorCategory};

/// Aggregate counts of jobs by lifecycle state.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStatus {
    /// Jobs waiting to be leased.
    pub pending: u64,
    /// Jobs currently leased.
    pub processing: u64,
    /// Jobs that finished successfully.
    pub completed: u64,
    /// Jobs that exhausted their retry budget.
    pub failed: u64,
    /// Total rows in the queue.
    pub total: u64,
}

/// Context recorded when a leased job fails.
#[derive(Debug, Clone)]
pub struct FailureContext {
    /// Human-readable error message.
    pub error: String,
    /// Classification driving retry policy.
    pub category: ErrorCategory,
    /// Best-effort error stack or extra context.
    pub error_stack: Option<String>,
}

/// A durable queue of [`EmbedJob`] records, persisted in a database isolated
/// from the graph store.
///
/// `lease` is the only method that must be atomic against concurrent
/// callers: two simultaneous `lease` calls must never select the same job.
/// All other methods operate on jobs already identified by id or by owner,
/// so ordinary row-level atomicity is sufficient.
pub trait JobQueue: Send + Sync {
    /// Inserts a new job for `(entity_uid, model, version)`, or re-queues an
    /// existing `failed` row for the same triple. Returns `None` if a
    /// `pending`/`processing`/`completed` row for the triple already exists
    /// (no-op).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn enqueue(
        &self,
        entity_uid: &str,
        model: &str,
        version: &str,
        priority: i32,
        max_attempts: u32,
    ) -> Result<Option<Uuid>>;

    /// Atomically leases up to `batch_size` pending (or lease-expired) jobs,
    /// ordered by `priority DESC, created_at ASC`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    fn lease(&self, batch_size: u32, worker_id: &str, lock_duration_ms: i64) -> Result<Vec<EmbedJob>>;

    /// Extends the lease on jobs still owned by `worker_id` and still
    /// `processing`. Returns the number of jobs extended.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn heartbeat(&self, job_ids: &[Uuid], worker_id: &str, lock_duration_ms: i64) -> Result<u64>;

    /// Voluntarily returns leased jobs to `pending`, clearing lock fields.
    /// Returns the number of jobs released.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn release(&self, job_ids: &[Uuid], worker_id: &str) -> Result<u64>;

    /// Returns any job whose lease has expired (`processing` with
    /// `lock_until` in the past) to `pending`, without resetting `attempts`.
    /// Returns the number of jobs recovered.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn recover_stale(&self) -> Result<u64>;

    /// Marks a leased job `completed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn complete(&self, job_id: Uuid, worker_id: &str) -> Result<()>;

    /// Marks a leased job `failed` permanently if its retry budget is
    /// exhausted, otherwise returns it to `pending`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn fail(&self, job_id: Uuid, worker_id: &str, ctx: FailureContext) -> Result<()>;

    /// Resets every `failed` job to `pending`, zeroing `attempts` and
    /// clearing error fields. Returns the number of jobs reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn retry_failed(&self) -> Result<u64>;

    /// Deletes `completed`/`failed` jobs whose `processed_at` is older than
    /// `retention_days`. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn cleanup(&self, retention_days: u32) -> Result<u64>;

    /// Returns aggregate counts by lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn queue_status(&self) -> Result<QueueStatus>;
}
