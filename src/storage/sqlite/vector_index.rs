//! `SQLite`-backed [`VectorIndex`]: brute-force similarity search over the
//! `vector` column of the `entities` table shared with [`super::SqliteGraphStore`].

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rusqlite::{Connection, params};
use tracing::instrument;

use crate::storage::traits::{IndexState, Similarity, VectorDiagnostics, VectorIndex, VectorMatch};
use crate::{Error, Result};

use super::record_operation_metrics;
use super::schema::GraphDatabase;
use super::acquire_lock;

/// `SQLite`-backed [`VectorIndex`] over the graph database's `entities` table.
pub struct SqliteVectorIndex {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
    similarity: Similarity,
}

impl SqliteVectorIndex {
    /// Builds a vector index sharing `db`'s connection.
    #[must_use]
    pub fn new(db: &GraphDatabase, dimensions: usize, similarity: Similarity) -> Self {
        Self {
            conn: db.connection(),
            dimensions,
            similarity,
        }
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.similarity {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::Euclidean => -euclidean_distance(a, b),
        }
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn similarity(&self) -> Similarity {
        self.similarity
    }

    #[instrument(skip(self, vector))]
    fn upsert(&self, name: &str, vector: &[f32], model: &str) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::InvalidInput(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        let start = Instant::now();
        let vector_json = serde_json::to_string(vector).map_err(|e| Error::OperationFailed {
            operation: "serialize_vector".to_string(),
            cause: e.to_string(),
        })?;
        let conn = acquire_lock(&self.conn);
        let now = crate::models::current_timestamp();
        conn.execute(
            "UPDATE entities SET vector = ?1, embedding_model = ?2, embedding_updated_at = ?3, updated_at = ?3
             WHERE name = ?4 AND valid_to IS NULL",
            params![vector_json, model, now, name],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "vector_upsert".to_string(),
            cause: e.to_string(),
        })?;
        record_operation_metrics("sqlite_vector", "upsert", start, "success");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, name: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let now = crate::models::current_timestamp();
        conn.execute(
            "UPDATE entities SET vector = NULL, embedding_model = NULL, embedding_updated_at = NULL, updated_at = ?1
             WHERE name = ?2 AND valid_to IS NULL",
            params![now, name],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "vector_remove".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    #[instrument(skip(self, query))]
    fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Result<Vec<VectorMatch>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT name, vector FROM entities WHERE valid_to IS NULL AND vector IS NOT NULL")
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_vector_search".to_string(),
                cause: e.to_string(),
            })?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let vector_json: String = row.get(1)?;
                Ok((name, vector_json))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "query_vector_search".to_string(),
                cause: e.to_string(),
            })?;

        let mut matches = Vec::new();
        for row in rows {
            let (name, vector_json) = row.map_err(|e| Error::OperationFailed {
                operation: "read_vector_row".to_string(),
                cause: e.to_string(),
            })?;
            let Ok(candidate) = serde_json::from_str::<Vec<f32>>(&vector_json) else {
                continue;
            };
            if candidate.len() != query.len() {
                continue;
            }
            let score = self.score(query, &candidate);
            if score >= min_similarity {
                matches.push(VectorMatch { name, score });
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        record_operation_metrics("sqlite_vector", "search", start, "success");
        Ok(matches)
    }

    fn diagnostics(&self) -> Result<VectorDiagnostics> {
        let conn = acquire_lock(&self.conn);
        let total_entities: i64 = conn
            .query_row(
                "SELECT count(*) FROM entities WHERE valid_to IS NULL",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "count_entities".to_string(),
                cause: e.to_string(),
            })?;
        let entities_with_embeddings: i64 = conn
            .query_row(
                "SELECT count(*) FROM entities WHERE valid_to IS NULL AND vector IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "count_embeddings".to_string(),
                cause: e.to_string(),
            })?;
        let state = if entities_with_embeddings > 0 {
            IndexState::Online
        } else {
            IndexState::Empty
        };
        Ok(VectorDiagnostics {
            state,
            dimensions: self.dimensions,
            entities_with_embeddings: entities_with_embeddings as u64,
            total_entities: total_entities as u64,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}
