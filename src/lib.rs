//! # subcog-graph
//!
//! A durable, semantic knowledge-graph memory service for LLM clients.
//!
//! Clients create typed entities, directed typed relations between them, and
//! attach textual observations, all communicated over a line-delimited MCP
//! JSON-RPC stream. Every mutation is bitemporally versioned: the graph's
//! state at any past instant can be reconstructed, and "no phantom relations"
//! holds at every externally observable point — a current relation always
//! connects two current entities.
//!
//! Observation changes enqueue durable embedding jobs in an isolated job
//! queue database; a background worker drains the queue, calls an embedding
//! provider, and writes vectors back so [`search::SearchService`] can answer
//! semantic and hybrid queries with explicit fallback diagnostics.
//!
//! ## Example
//!
//! ```rust,ignore
//! use subcog_graph::{KnowledgeGraph, config::GraphConfig};
//!
//! let config = GraphConfig::from_env()?;
//! let graph = KnowledgeGraph::open(&config)?;
//! graph.create_entities(vec![entity])?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod embedding;
pub mod facade;
pub mod gc;
pub mod health;
pub mod mcp;
pub mod models;
pub mod observability;
pub mod search;
pub mod storage;

pub use config::GraphConfig;
pub use embedding::Embedder;
pub use facade::KnowledgeGraph;
pub use models::{EmbedJob, Entity, ErrorCategory, JobStatus, Metadata, Relation};
pub use search::{SearchOptions, SearchService};
pub use storage::traits::{GraphStore, JobQueue, VectorIndex};

/// Error type for `subcog-graph` operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// The three-way `TRANSIENT`/`PERMANENT`/`CRITICAL` failure taxonomy used by
/// the embedding worker is a separate, narrower classification
/// ([`models::ErrorCategory`]) carried on [`models::EmbedJob`] records; this
/// enum is the general-purpose error surfaced by the public API.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing required parameters, malformed arguments |
/// | `EntityNotCurrent` | A relation operation targets an archived entity |
/// | `InvariantViolation` | A bitemporal invariant would be broken (bug, not user error) |
/// | `SemanticUnavailable` | Strict-mode search requested semantic/hybrid but none is available |
/// | `OperationFailed` | Storage I/O errors, transaction failures |
/// | `ConfigError` | Startup configuration is missing or out of range |
/// | `NotImplemented` | Calling an unfinished feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A relation operation targeted an entity that is no longer current.
    #[error("entity '{0}' is not the current version")]
    EntityNotCurrent(String),

    /// A bitemporal invariant would have been violated by this operation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Strict-mode search requested semantic or hybrid search but neither is
    /// available; see [`search::SearchDiagnostics::fallback_reason`].
    #[error("semantic search unavailable: {reason}")]
    SemanticUnavailable {
        /// Why semantic search could not be performed.
        reason: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration was missing or out of the allowed range at startup.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Feature not yet implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for `subcog-graph` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Centralized so lease/heartbeat arithmetic throughout the job queue and
/// embedding worker uses one consistent clock source.
#[must_use]
pub fn current_timestamp_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    #[allow(clippy::cast_possible_wrap)]
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::SemanticUnavailable {
            reason: "no_embeddings_available".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "semantic search unavailable: no_embeddings_available"
        );
    }

    #[test]
    fn test_current_timestamp_ms_is_reasonable() {
        let ts = current_timestamp_ms();
        assert!(ts > 1_700_000_000_000);
    }
}
