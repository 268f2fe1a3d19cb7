//! Shared `SQLite` infrastructure for the graph store and the job queue.
//!
//! Both databases are plain SQLite files behind a single [`std::sync::Mutex`]
//! guarding one [`rusqlite::Connection`] each: one exclusive connection
//! per database file. This module holds what they have in common.
//!
//! - [`connection`]: connection handling (`Mutex<Connection>`, lock acquisition, pragma setup)
//! - [`sql`]: LIKE-wildcard escaping for keyword search
//! - [`metrics`]: shared operation-metrics recording
//! - [`schema`]: idempotent schema creation for both database files
//! - [`graph_store`]: the `GraphStore` implementation
//! - [`vector_index`]: the `VectorIndex` implementation (same database as the graph store)
//! - [`job_queue`]: the `JobQueue` implementation (isolated database)

mod connection;
mod graph_store;
mod job_queue;
mod metrics;
pub mod schema;
mod sql;
mod vector_index;

pub use connection::{
    MUTEX_LOCK_TIMEOUT, acquire_lock, acquire_lock_with_timeout, configure_connection,
};
pub use graph_store::SqliteGraphStore;
pub use job_queue::SqliteJobQueue;
pub use metrics::record_operation_metrics;
pub use schema::{GraphDatabase, JobDatabase};
pub use sql::escape_like_wildcards;
pub use vector_index::SqliteVectorIndex;
