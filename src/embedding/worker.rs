//! `EmbeddingWorker`: drains the job queue, calls the embedding provider,
//! and writes vectors back through [`GraphStore`] and [`VectorIndex`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::models::ErrorCategory;
use crate::storage::traits::{FailureContext, GraphStore, JobQueue, VectorIndex};
use crate::{Embedder, Error, Result};

use super::rate_limiter::RateLimiter;

/// Tuning knobs for an [`EmbeddingWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifies this worker's leases to the job queue.
    pub worker_id: String,
    /// Jobs leased per iteration of the main loop.
    pub batch_size: u32,
    /// How often the main loop wakes to lease and process jobs.
    pub process_interval: Duration,
    /// Lease duration handed to `JobQueue::lease`.
    pub lock_duration_ms: i64,
    /// How often the heartbeat ticker extends leases for in-flight jobs.
    pub heartbeat_interval_ms: i64,
    /// How often `recover_stale` runs; `0` disables the periodic tick
    /// (construction still runs it once).
    pub recovery_interval_ms: i64,
    /// Deadline for a single call to the embedding provider.
    pub embed_timeout: Duration,
    /// Rate-limiter bucket capacity.
    pub rate_limit_tokens: u32,
    /// Rate-limiter refill interval.
    pub rate_limit_interval: Duration,
    /// In-process embedding cache capacity.
    pub cache_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            batch_size: 10,
            process_interval: Duration::from_secs(10),
            lock_duration_ms: 300_000,
            heartbeat_interval_ms: 120_000,
            recovery_interval_ms: 60_000,
            embed_timeout: Duration::from_secs(30),
            rate_limit_tokens: 20,
            rate_limit_interval: Duration::from_millis(60_000),
            cache_capacity: 1_000,
        }
    }
}

/// Health classification exported for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerHealthState {
    /// Operating normally.
    Healthy,
    /// Elevated failure rate; still making progress.
    Degraded,
    /// Failing persistently; operator attention warranted.
    Critical,
}

/// Point-in-time snapshot of worker health, for the `/health` endpoint.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    /// Current classification.
    pub state: WorkerHealthState,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Success rate over the last (up to) 100 outcomes.
    pub success_rate: f64,
    /// Count of failures seen per error category.
    pub error_patterns: HashMap<ErrorCategory, u64>,
    /// Unix timestamp (seconds) of the last successful embed, if any.
    pub last_success_timestamp: Option<i64>,
}

struct HealthTracker {
    consecutive_failures: u32,
    recent_outcomes: VecDeque<bool>,
    category_counts: HashMap<ErrorCategory, u64>,
    last_success_timestamp: Option<i64>,
}

impl HealthTracker {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            recent_outcomes: VecDeque::with_capacity(100),
            category_counts: HashMap::new(),
            last_success_timestamp: None,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_success_timestamp = Some(crate::models::temporal::current_timestamp());
        self.push_outcome(true);
    }

    fn record_failure(&mut self, category: ErrorCategory) {
        self.consecutive_failures += 1;
        *self.category_counts.entry(category).or_insert(0) += 1;
        self.push_outcome(false);
    }

    fn push_outcome(&mut self, ok: bool) {
        self.recent_outcomes.push_back(ok);
        if self.recent_outcomes.len() > 100 {
            self.recent_outcomes.pop_front();
        }
    }

    fn success_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            1.0
        } else {
            let ok = self.recent_outcomes.iter().filter(|o| **o).count();
            ok as f64 / self.recent_outcomes.len() as f64
        }
    }

    fn state(&self) -> WorkerHealthState {
        if self.consecutive_failures >= 10 {
            WorkerHealthState::Critical
        } else if self.consecutive_failures >= 5 || self.success_rate() < 0.5 {
            WorkerHealthState::Degraded
        } else {
            WorkerHealthState::Healthy
        }
    }

    fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            consecutive_failures: self.consecutive_failures,
            success_rate: self.success_rate(),
            error_patterns: self.category_counts.clone(),
            last_success_timestamp: self.last_success_timestamp,
        }
    }
}

/// Drains a [`JobQueue`], producing embeddings and writing them back.
pub struct EmbeddingWorker {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorIndex>,
    queue: Arc<dyn JobQueue>,
    embedder: Arc<dyn Embedder>,
    config: WorkerConfig,
    rate_limiter: RateLimiter,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    health: Mutex<HealthTracker>,
}

impl EmbeddingWorker {
    /// Builds a worker over the given backends.
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorIndex>,
        queue: Arc<dyn JobQueue>,
        embedder: Arc<dyn Embedder>,
        config: WorkerConfig,
    ) -> Self {
        let cache_capacity = std::num::NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(std::num::NonZeroUsize::new(1).expect("1 is nonzero"));
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit_tokens, config.rate_limit_interval),
            cache: Mutex::new(LruCache::new(cache_capacity)),
            health: Mutex::new(HealthTracker::new()),
            graph,
            vector,
            queue,
            embedder,
            config,
        }
    }

    /// Current health classification.
    #[must_use]
    pub fn health(&self) -> WorkerHealthState {
        self.health.lock().unwrap_or_else(std::sync::PoisonError::into_inner).state()
    }

    /// Full health snapshot, for the `/health` endpoint.
    #[must_use]
    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.health.lock().unwrap_or_else(std::sync::PoisonError::into_inner).snapshot()
    }

    /// Runs the worker's main loop until `cancellation` fires.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) {
        if let Err(e) = self.recover_stale().await {
            warn!(error = %e, "initial stale-lease recovery failed");
        }

        let recovery_task = if self.config.recovery_interval_ms > 0 {
            let worker = Arc::clone(&self);
            let token = cancellation.clone();
            let interval = Duration::from_millis(self.config.recovery_interval_ms.max(1) as u64);
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = worker.recover_stale().await {
                                warn!(error = %e, "periodic stale-lease recovery failed");
                            }
                        }
                    }
                }
            }))
        } else {
            None
        };

        let mut ticker = tokio::time::interval(self.config.process_interval);
        loop {
            tokio::select! {
                () = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "embedding worker iteration failed");
                    }
                }
            }
        }

        if let Some(task) = recovery_task {
            task.abort();
        }
    }

    async fn recover_stale(&self) -> Result<u64> {
        let queue = Arc::clone(&self.queue);
        tokio::task::spawn_blocking(move || queue.recover_stale())
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "recover_stale_join".to_string(),
                cause: e.to_string(),
            })?
    }

    #[instrument(skip(self))]
    async fn run_once(&self) -> Result<()> {
        let queue = Arc::clone(&self.queue);
        let worker_id = self.config.worker_id.clone();
        let batch_size = self.config.batch_size;
        let lock_duration_ms = self.config.lock_duration_ms;
        let leased = tokio::task::spawn_blocking(move || queue.lease(batch_size, &worker_id, lock_duration_ms))
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "lease_join".to_string(),
                cause: e.to_string(),
            })??;

        if leased.is_empty() {
            return Ok(());
        }

        let active_ids: Arc<Mutex<Vec<Uuid>>> = Arc::new(Mutex::new(leased.iter().map(|j| j.id).collect()));
        let heartbeat_token = CancellationToken::new();
        let heartbeat_task = {
            let queue = Arc::clone(&self.queue);
            let worker_id = self.config.worker_id.clone();
            let lock_duration_ms = self.config.lock_duration_ms;
            let interval = Duration::from_millis(self.config.heartbeat_interval_ms.max(1) as u64);
            let active_ids = Arc::clone(&active_ids);
            let token = heartbeat_token.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let ids = active_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
                            if ids.is_empty() {
                                continue;
                            }
                            let queue = Arc::clone(&queue);
                            let worker_id = worker_id.clone();
                            let _ = tokio::task::spawn_blocking(move || queue.heartbeat(&ids, &worker_id, lock_duration_ms)).await;
                        }
                    }
                }
            })
        };

        for job in leased {
            if !self.rate_limiter.try_consume() {
                let remaining: Vec<Uuid> = {
                    let mut guard = active_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    std::mem::take(&mut *guard)
                };
                if !remaining.is_empty() {
                    let queue = Arc::clone(&self.queue);
                    let worker_id = self.config.worker_id.clone();
                    let _ = tokio::task::spawn_blocking(move || queue.release(&remaining, &worker_id)).await;
                }
                break;
            }

            self.process_one(&job).await;

            let mut guard = active_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.retain(|id| *id != job.id);
        }

        heartbeat_token.cancel();
        let _ = heartbeat_task.await;
        Ok(())
    }

    async fn process_one(&self, job: &crate::models::EmbedJob) {
        let entity_name = job.entity_uid.clone();
        let graph = Arc::clone(&self.graph);
        let entity = tokio::task::spawn_blocking(move || graph.get_entity(&entity_name)).await;

        let entity = match entity {
            Ok(Ok(Some(entity))) => entity,
            Ok(Ok(None)) => {
                self.fail_job(job, "entity no longer current".to_string(), ErrorCategory::Permanent, None)
                    .await;
                return;
            },
            Ok(Err(e)) => {
                self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                return;
            },
            Err(e) => {
                self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                return;
            },
        };

        let canonical = entity.canonical_text();
        let cache_key = {
            let mut hasher = Sha256::new();
            hasher.update(canonical.as_bytes());
            format!("{:x}", hasher.finalize())
        };

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&cache_key)
            .cloned();

        let vector = match cached {
            Some(vector) => vector,
            None => {
                let embedder = Arc::clone(&self.embedder);
                let text = canonical.clone();
                let outcome = tokio::time::timeout(
                    self.config.embed_timeout,
                    tokio::task::spawn_blocking(move || embedder.embed(&text)),
                )
                .await;

                match outcome {
                    Ok(Ok(Ok(vector))) => {
                        self.cache
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .put(cache_key, vector.clone());
                        vector
                    },
                    Ok(Ok(Err(e))) => {
                        self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                        return;
                    },
                    Ok(Err(e)) => {
                        self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                        return;
                    },
                    Err(_) => {
                        self.fail_job(job, "embedding provider call timed out".to_string(), ErrorCategory::Transient, None)
                            .await;
                        return;
                    },
                }
            },
        };

        let vector_index = Arc::clone(&self.vector);
        let name = entity.name.clone();
        let model = job.model.clone();
        let upsert_vector = vector.clone();
        let upsert_result =
            tokio::task::spawn_blocking(move || vector_index.upsert(&name, &upsert_vector, &model)).await;

        match upsert_result {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                return;
            },
            Err(e) => {
                self.fail_job(job, e.to_string(), ErrorCategory::Transient, None).await;
                return;
            },
        }

        let queue = Arc::clone(&self.queue);
        let job_id = job.id;
        let worker_id = self.config.worker_id.clone();
        let complete_result = tokio::task::spawn_blocking(move || queue.complete(job_id, &worker_id)).await;
        match complete_result {
            Ok(Ok(())) => {
                self.health.lock().unwrap_or_else(std::sync::PoisonError::into_inner).record_success();
            },
            Ok(Err(e)) => warn!(job_id = %job.id, error = %e, "failed to mark job completed"),
            Err(e) => warn!(job_id = %job.id, error = %e, "complete task join failed"),
        }
    }

    async fn fail_job(&self, job: &crate::models::EmbedJob, error: String, category: ErrorCategory, stack: Option<String>) {
        self.health
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .record_failure(category);
        let queue = Arc::clone(&self.queue);
        let job_id = job.id;
        let worker_id = self.config.worker_id.clone();
        let ctx = FailureContext {
            error,
            category,
            error_stack: stack,
        };
        let result = tokio::task::spawn_blocking(move || queue.fail(job_id, &worker_id, ctx)).await;
        if let Err(e) = result {
            warn!(job_id = %job.id, error = %e, "fail task join failed");
        }
    }
}
