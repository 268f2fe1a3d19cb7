//! `VectorIndex` trait: per-entity embedding storage and similarity search.
//!
//! The reference implementation performs an exact brute-force scan over the
//! vectors held on current entity rows in the graph database — there is no
//! separate ANN index structure, but the external contract (cosine/Euclidean
//! top-k search over current entities) is the same one a native vector index
//! would offer.

use crate::Result;

/// Similarity metric used by a [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    /// Cosine similarity (the default).
    Cosine,
    /// Negative Euclidean distance, so higher is still "more similar".
    Euclidean,
}

/// One match returned by [`VectorIndex::search`].
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// The matching entity's name.
    pub name: String,
    /// The similarity score (higher is more similar).
    pub score: f32,
}

/// Operational state of a [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// The index is available and serving queries.
    Online,
    /// The index has no current entities with embeddings.
    Empty,
}

/// Coverage and health information for a [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct VectorDiagnostics {
    /// Current operational state.
    pub state: IndexState,
    /// Configured vector dimensionality.
    pub dimensions: usize,
    /// Number of current entities with a stored embedding.
    pub entities_with_embeddings: u64,
    /// Total number of current entities.
    pub total_entities: u64,
}

impl VectorDiagnostics {
    /// Fraction of current entities that have an embedding, in `[0, 1]`.
    #[must_use]
    pub fn coverage(&self) -> f64 {
        if self.total_entities == 0 {
            0.0
        } else {
            self.entities_with_embeddings as f64 / self.total_entities as f64
        }
    }
}

/// Per-entity embedding storage and top-k similarity search, scoped to
/// currently-valid entity versions.
pub trait VectorIndex: Send + Sync {
    /// The dimensionality every stored vector must match.
    fn dimensions(&self) -> usize;

    /// The similarity metric this index uses.
    fn similarity(&self) -> Similarity;

    /// Writes `vector` onto the current row for `name`. No-op if `name` has
    /// no current row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert(&self, name: &str, vector: &[f32], model: &str) -> Result<()>;

    /// Clears the vector on the current row for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remove(&self, name: &str) -> Result<()>;

    /// Returns the top `k` current entities most similar to `query`, each
    /// scoring at least `min_similarity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Result<Vec<VectorMatch>>;

    /// Reports index coverage and health.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying counts cannot be read.
    fn diagnostics(&self) -> Result<VectorDiagnostics>;
}
