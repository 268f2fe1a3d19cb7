//! Storage layer abstraction.
//!
//! Three traits ([`traits::GraphStore`], [`traits::VectorIndex`],
//! [`traits::JobQueue`]) define the storage contract; [`sqlite`] is the
//! reference implementation backing all three over two `SQLite` database
//! files.

pub mod sqlite;
pub mod traits;

pub use sqlite::{GraphDatabase, JobDatabase, SqliteGraphStore, SqliteJobQueue, SqliteVectorIndex};
pub use traits::{GraphStore, JobQueue, VectorIndex};
