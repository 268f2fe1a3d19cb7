//! Data models for the knowledge graph memory service.
//!
//! This module contains all the core data structures used throughout the system.

mod entity;
mod job;
mod metadata;
mod relation;
pub mod temporal;

pub use entity::{Entity, merge_observations, remove_observations};
pub use job::{EmbedJob, ErrorCategory, JobStatus};
pub use metadata::Metadata;
pub use relation::{DEFAULT_CONFIDENCE, DEFAULT_STRENGTH, Relation};
pub use temporal::current_timestamp;
