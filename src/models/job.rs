//! `EmbedJob`: a durable unit of embedding work in the job queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::temporal::current_timestamp;

/// Lifecycle state of an [`EmbedJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be leased.
    Pending,
    /// Currently leased by a worker.
    Processing,
    /// Finished successfully.
    Completed,
    /// Exhausted its retry budget.
    Failed,
}

impl JobStatus {
    /// The string stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses the `status` column value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Classification of why an [`EmbedJob`] failed, driving retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Worth retrying with backoff (timeouts, provider rate limits).
    Transient,
    /// Will never succeed on retry (missing entity, validation failure).
    Permanent,
    /// Indicates the worker itself must stop (corruption, invariant breach).
    Critical,
}

impl ErrorCategory {
    /// The string stored in the `error_category` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Critical => "critical",
        }
    }

    /// Parses the `error_category` column value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transient" => Some(Self::Transient),
            "permanent" => Some(Self::Permanent),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A durable request to compute and persist an embedding for one entity
/// version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedJob {
    /// Opaque job identifier.
    pub id: Uuid,
    /// Name of the entity to embed.
    pub entity_uid: String,
    /// Embedding model requested.
    pub model: String,
    /// Entity version this job targets, as a string (matches the entity's
    /// `version` column at enqueue time).
    pub version: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Scheduling priority; higher leases first.
    pub priority: i32,
    /// When the job was created.
    pub created_at: i64,
    /// When the job reached a terminal state, if it has.
    pub processed_at: Option<i64>,
    /// Number of lease attempts so far.
    pub attempts: u32,
    /// Maximum attempts before the job becomes permanently `failed`.
    pub max_attempts: u32,
    /// Worker id currently holding the lease, if any.
    pub lock_owner: Option<String>,
    /// Lease expiry, in epoch milliseconds.
    pub lock_until: Option<i64>,
    /// Last error message, if any.
    pub error: Option<String>,
    /// Category of the last error, if any.
    pub error_category: Option<ErrorCategory>,
    /// Best-effort error stack/context, if any.
    pub error_stack: Option<String>,
    /// `true` once the job has exhausted retries or hit a permanent error.
    pub permanent: bool,
}

impl EmbedJob {
    /// Creates a new `pending` job.
    #[must_use]
    pub fn new(entity_uid: impl Into<String>, model: impl Into<String>, version: impl Into<String>, priority: i32, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_uid: entity_uid.into(),
            model: model.into(),
            version: version.into(),
            status: JobStatus::Pending,
            priority,
            created_at: current_timestamp(),
            processed_at: None,
            attempts: 0,
            max_attempts,
            lock_owner: None,
            lock_until: None,
            error: None,
            error_category: None,
            error_stack: None,
            permanent: false,
        }
    }

    /// Returns `true` if another `attempts` increment would exhaust the
    /// retry budget.
    #[must_use]
    pub const fn exhausts_retries(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn error_category_round_trips_through_str() {
        for c in [
            ErrorCategory::Transient,
            ErrorCategory::Permanent,
            ErrorCategory::Critical,
        ] {
            assert_eq!(ErrorCategory::parse(c.as_str()), Some(c));
        }
    }

    #[test]
    fn new_job_is_pending_with_zero_attempts() {
        let job = EmbedJob::new("Alice", "text-embedding-3-small", "1", 0, 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(!job.exhausts_retries());
    }
}
