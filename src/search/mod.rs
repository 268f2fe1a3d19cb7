//! `SearchService`: keyword, semantic, and hybrid search over the graph,
//! with an explicit fallback ladder from semantic down to keyword.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::models::Entity;
use crate::storage::traits::{GraphStore, VectorIndex};
use crate::{Embedder, Error, Result};

const COVERAGE_CACHE_TTL: Duration = Duration::from_secs(60);
const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.6;

/// Which search strategy was requested or actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Substring match on entity names and relation endpoints.
    Keyword,
    /// Vector similarity only.
    Semantic,
    /// Linear combination of vector and textual-match score.
    Hybrid,
}

/// Options controlling a [`SearchService::search`] call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchOptions {
    /// Requested strategy.
    pub requested: SearchType,
    /// Maximum results returned.
    pub limit: usize,
    /// Minimum similarity score for semantic/hybrid results.
    pub min_similarity: f32,
    /// Restrict results to these entity types, if non-empty.
    pub entity_types: Vec<String>,
    /// If `true`, a semantic/hybrid request that falls back to keyword
    /// raises [`crate::Error::SemanticUnavailable`] instead of returning
    /// keyword results.
    pub strict_mode: bool,
    /// Weight given to the vector score in hybrid mode; `1 - weight` goes
    /// to the textual-match score.
    pub semantic_weight: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            requested: SearchType::Keyword,
            limit: 10,
            min_similarity: 0.0,
            entity_types: Vec::new(),
            strict_mode: false,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
        }
    }
}

/// One scored search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matching entity.
    pub entity: Entity,
    /// Combined relevance score.
    pub score: f32,
}

/// Explains what strategy actually ran and why, for observability.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDiagnostics {
    /// What the caller asked for.
    pub requested_search_type: SearchType,
    /// What actually ran.
    pub actual_search_type: SearchType,
    /// Why `actual` differs from `requested`, if it does.
    pub fallback_reason: Option<String>,
    /// Time spent generating the query embedding.
    pub query_vector_generation_time: Duration,
    /// Time spent in the vector index search.
    pub vector_search_time: Duration,
    /// Total current entities at the time of the query.
    pub total_entities: u64,
    /// Current entities carrying an embedding.
    pub entities_with_embeddings: u64,
    /// `entities_with_embeddings / total_entities`.
    pub embedding_coverage: f64,
}

/// The result of a [`SearchService::search`] call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Scored, filtered, limited results.
    pub results: Vec<SearchResult>,
    /// Why and how the search actually ran.
    pub diagnostics: SearchDiagnostics,
}

struct CoverageCache {
    computed_at: Instant,
    total_entities: u64,
    entities_with_embeddings: u64,
}

/// Composes [`GraphStore`] and [`VectorIndex`] to answer search queries.
pub struct SearchService {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    coverage_cache: Mutex<Option<CoverageCache>>,
}

impl SearchService {
    /// Builds a search service. `embedder` is `None` when no embedding
    /// provider is configured, which forces every semantic/hybrid request
    /// to fall back to keyword search.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>, vector: Arc<dyn VectorIndex>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            graph,
            vector,
            embedder,
            coverage_cache: Mutex::new(None),
        }
    }

    #[instrument(skip(self, opts))]
    pub fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchOutcome> {
        let (total_entities, entities_with_embeddings) = self.coverage()?;
        let embedding_coverage = if total_entities == 0 {
            0.0
        } else {
            entities_with_embeddings as f64 / total_entities as f64
        };

        let mut query_vector_generation_time = Duration::ZERO;
        let mut vector_search_time = Duration::ZERO;
        let mut fallback_reason = None;
        let mut actual = SearchType::Keyword;
        let mut semantic_scores: Vec<(String, f32)> = Vec::new();

        if opts.requested != SearchType::Keyword {
            match self.try_semantic(query, opts, &mut query_vector_generation_time, &mut vector_search_time) {
                Ok(scores) if !scores.is_empty() => {
                    semantic_scores = scores;
                    actual = opts.requested;
                },
                Ok(_) => fallback_reason = Some("no_embeddings_available".to_string()),
                Err(reason) => fallback_reason = Some(reason),
            }
        }

        if opts.strict_mode && opts.requested != SearchType::Keyword && actual == SearchType::Keyword {
            let reason = fallback_reason.unwrap_or_else(|| "embedding_service_not_configured".to_string());
            return Err(Error::SemanticUnavailable { reason });
        }

        let snapshot = self.graph.search_nodes(query)?;
        let mut results: Vec<SearchResult> = match actual {
            SearchType::Keyword => snapshot
                .entities
                .into_iter()
                .map(|entity| SearchResult { entity, score: 1.0 })
                .collect(),
            SearchType::Semantic => semantic_scores
                .into_iter()
                .filter_map(|(name, score)| self.graph.get_entity(&name).ok().flatten().map(|entity| (entity, score)))
                .map(|(entity, score)| SearchResult { entity, score })
                .collect(),
            SearchType::Hybrid => {
                let textual: std::collections::HashSet<String> =
                    snapshot.entities.iter().map(|e| e.name.clone()).collect();
                semantic_scores
                    .into_iter()
                    .filter_map(|(name, vector_score)| {
                        self.graph.get_entity(&name).ok().flatten().map(|entity| {
                            let textual_score = if textual.contains(&name) { 1.0 } else { 0.0 };
                            let score = opts.semantic_weight * vector_score + (1.0 - opts.semantic_weight) * textual_score;
                            (entity, score)
                        })
                    })
                    .map(|(entity, score)| SearchResult { entity, score })
                    .collect()
            },
        };

        if !opts.entity_types.is_empty() {
            results.retain(|r| opts.entity_types.iter().any(|t| t == &r.entity.entity_type));
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(opts.limit);

        Ok(SearchOutcome {
            results,
            diagnostics: SearchDiagnostics {
                requested_search_type: opts.requested,
                actual_search_type: actual,
                fallback_reason,
                query_vector_generation_time,
                vector_search_time,
                total_entities,
                entities_with_embeddings,
                embedding_coverage,
            },
        })
    }

    fn try_semantic(
        &self,
        query: &str,
        opts: &SearchOptions,
        query_vector_generation_time: &mut Duration,
        vector_search_time: &mut Duration,
    ) -> std::result::Result<Vec<(String, f32)>, String> {
        let Some(embedder) = &self.embedder else {
            return Err("embedding_service_not_configured".to_string());
        };

        let embed_start = Instant::now();
        let query_vector = embedder.embed(query).map_err(|_| "query_embedding_failed".to_string())?;
        *query_vector_generation_time = embed_start.elapsed();

        let search_start = Instant::now();
        let matches = self
            .vector
            .search(&query_vector, opts.limit.max(1), opts.min_similarity)
            .map_err(|_| "query_embedding_failed".to_string())?;
        *vector_search_time = search_start.elapsed();

        Ok(matches.into_iter().map(|m| (m.name, m.score)).collect())
    }

    fn coverage(&self) -> Result<(u64, u64)> {
        {
            let cache = self.coverage_cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(entry) = cache.as_ref()
                && entry.computed_at.elapsed() < COVERAGE_CACHE_TTL
            {
                return Ok((entry.total_entities, entry.entities_with_embeddings));
            }
        }
        let diagnostics = self.vector.diagnostics()?;
        let mut cache = self.coverage_cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *cache = Some(CoverageCache {
            computed_at: Instant::now(),
            total_entities: diagnostics.total_entities,
            entities_with_embeddings: diagnostics.entities_with_embeddings,
        });
        Ok((diagnostics.total_entities, diagnostics.entities_with_embeddings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::{GraphDatabase, SqliteGraphStore, SqliteVectorIndex};
    use crate::storage::traits::{EntityInput, Similarity};

    fn service(embedder: Option<Arc<dyn Embedder>>) -> SearchService {
        let db = GraphDatabase::in_memory().expect("opens");
        let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(&db));
        let vector: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(&db, 3, Similarity::Cosine));
        graph
            .create_entities(vec![EntityInput {
                name: "Alice".into(),
                entity_type: "person".into(),
                observations: vec!["likes tea".into()],
            }])
            .expect("ok");
        SearchService::new(graph, vector, embedder)
    }

    #[test]
    fn keyword_search_finds_substring_match() {
        let service = service(None);
        let outcome = service
            .search(
                "Ali",
                &SearchOptions {
                    requested: SearchType::Keyword,
                    ..Default::default()
                },
            )
            .expect("ok");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.diagnostics.actual_search_type, SearchType::Keyword);
    }

    #[test]
    fn semantic_without_embedder_falls_back_to_keyword() {
        let service = service(None);
        let outcome = service
            .search(
                "Alice",
                &SearchOptions {
                    requested: SearchType::Semantic,
                    ..Default::default()
                },
            )
            .expect("ok");
        assert_eq!(outcome.diagnostics.actual_search_type, SearchType::Keyword);
        assert_eq!(
            outcome.diagnostics.fallback_reason.as_deref(),
            Some("embedding_service_not_configured")
        );
    }

    #[test]
    fn strict_mode_raises_when_semantic_unavailable() {
        let service = service(None);
        let result = service.search(
            "Alice",
            &SearchOptions {
                requested: SearchType::Semantic,
                strict_mode: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::SemanticUnavailable { .. })));
    }
}
