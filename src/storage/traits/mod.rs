//! Storage backend traits.

mod graph;
mod job_queue;
mod vector;

pub use graph::{
    DecayOptions, EntityInput, GraphSnapshot, GraphStore, ObservationDelta, ObservationsAdded,
    RelationInput, RelationKey,
};
pub use job_queue::{FailureContext, JobQueue, QueueStatus};
pub use vector::{IndexState, Similarity, VectorDiagnostics, VectorIndex, VectorMatch};
