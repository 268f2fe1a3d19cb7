//! `KnowledgeGraph`: the single async entry point over the synchronous
//! storage traits.
//!
//! Every storage call is synchronous (the traits are built around a
//! `Mutex<Connection>`); this facade is what performs the
//! `tokio::task::spawn_blocking` wrapping, so callers (the MCP dispatch
//! layer, tests, `main`) never touch a blocking call directly.

use std::sync::Arc;

use tracing::instrument;

use crate::models::{Entity, Relation};
use crate::search::{SearchOptions, SearchOutcome, SearchService};
use crate::storage::traits::{
    DecayOptions, EntityInput, GraphSnapshot, GraphStore, JobQueue, ObservationDelta, ObservationsAdded,
    RelationInput, RelationKey, VectorIndex,
};
use crate::{Embedder, Error, Result};

/// Parameters used when the facade enqueues an `EmbedJob` on behalf of a mutation.
#[derive(Debug, Clone)]
pub struct EmbedJobDefaults {
    /// Embedding model identifier recorded on enqueued jobs.
    pub model: String,
    /// Scheduling priority for enqueued jobs.
    pub priority: i32,
    /// Retry budget for enqueued jobs.
    pub max_attempts: u32,
}

impl Default for EmbedJobDefaults {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            priority: 0,
            max_attempts: 3,
        }
    }
}

/// The application-facing entry point: owns the graph store, vector index,
/// job queue, and search service, and enqueues embedding work whenever a
/// mutation changes an entity's observations.
pub struct KnowledgeGraph {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorIndex>,
    queue: Arc<dyn JobQueue>,
    search: SearchService,
    embedder_configured: bool,
    embed_job_defaults: EmbedJobDefaults,
}

impl KnowledgeGraph {
    /// Builds a facade over the given backends. `embedder` is passed to the
    /// search service and also determines whether mutations enqueue
    /// embedding jobs at all.
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorIndex>,
        queue: Arc<dyn JobQueue>,
        embedder: Option<Arc<dyn Embedder>>,
        embed_job_defaults: EmbedJobDefaults,
    ) -> Self {
        let embedder_configured = embedder.is_some();
        Self {
            search: SearchService::new(Arc::clone(&graph), Arc::clone(&vector), embedder),
            graph,
            vector,
            queue,
            embedder_configured,
            embed_job_defaults,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f).await.map_err(|e| Error::OperationFailed {
            operation: "blocking_join".to_string(),
            cause: e.to_string(),
        })?
    }

    fn enqueue_embed_job(&self, entity: &Entity) {
        if !self.embedder_configured {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let entity_uid = entity.name.clone();
        let version = entity.version.to_string();
        let defaults = self.embed_job_defaults.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = queue.enqueue(&entity_uid, &defaults.model, &version, defaults.priority, defaults.max_attempts) {
                tracing::warn!(entity = %entity_uid, error = %e, "failed to enqueue embed job");
            }
        });
    }

    /// Creates or versions entities, enqueueing embedding jobs for each
    /// entity whose state changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    #[instrument(skip(self, inputs))]
    pub async fn create_entities(&self, inputs: Vec<EntityInput>) -> Result<Vec<Entity>> {
        let graph = Arc::clone(&self.graph);
        let created = self.blocking(move || graph.create_entities(inputs)).await?;
        for entity in &created {
            self.enqueue_embed_job(entity);
        }
        Ok(created)
    }

    /// Merges observations into entities, enqueueing embedding jobs for
    /// entities that actually gained new text.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn add_observations(&self, deltas: Vec<ObservationDelta>) -> Result<Vec<ObservationsAdded>> {
        let graph = Arc::clone(&self.graph);
        let result = self.blocking(move || graph.add_observations(deltas)).await?;
        for added in &result {
            if added.added_observations.is_empty() {
                continue;
            }
            let graph = Arc::clone(&self.graph);
            let name = added.entity_name.clone();
            if let Ok(Some(entity)) = self.blocking(move || graph.get_entity(&name)).await {
                self.enqueue_embed_job(&entity);
            }
        }
        Ok(result)
    }

    /// Removes observations from entities, enqueueing embedding jobs for
    /// entities whose text actually changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn delete_observations(&self, deletions: Vec<ObservationDelta>) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let names: Vec<String> = deletions.iter().map(|d| d.entity_name.clone()).collect();
        self.blocking(move || graph.delete_observations(deletions)).await?;
        for name in names {
            let graph = Arc::clone(&self.graph);
            if let Ok(Some(entity)) = self.blocking(move || graph.get_entity(&name)).await {
                self.enqueue_embed_job(&entity);
            }
        }
        Ok(())
    }

    /// Soft-deletes entities and their current edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn delete_entities(&self, names: Vec<String>) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.delete_entities(&names)).await
    }

    /// Creates relations between currently-valid endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn create_relations(&self, relations: Vec<RelationInput>) -> Result<Vec<Relation>> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.create_relations(relations)).await
    }

    /// Replaces the current edge matching `relation`'s identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotCurrent`] or a store error.
    pub async fn update_relation(&self, relation: Relation) -> Result<Relation> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.update_relation(relation)).await
    }

    /// Soft-deletes the current edges matching each key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn delete_relations(&self, relations: Vec<RelationKey>) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.delete_relations(&relations)).await
    }

    /// Returns the current edge matching `from`/`to`/`relation_type`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_relation(&self, from: String, to: String, relation_type: String) -> Result<Option<Relation>> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_relation(&from, &to, &relation_type)).await
    }

    /// Returns the full current graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn load_graph(&self) -> Result<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.load_graph()).await
    }

    /// Returns the current version of one entity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_entity(&self, name: String) -> Result<Option<Entity>> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_entity(&name)).await
    }

    /// Returns current entities/relations whose name or endpoint contains `substring`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn search_nodes(&self, substring: String) -> Result<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.search_nodes(&substring)).await
    }

    /// Returns the current entities named in `names`, plus relations between them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn open_nodes(&self, names: Vec<String>) -> Result<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.open_nodes(&names)).await
    }

    /// Returns every version of the named entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_entity_history(&self, name: String) -> Result<Vec<Entity>> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_entity_history(&name)).await
    }

    /// Returns every version of the named relation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_relation_history(&self, from: String, to: String, relation_type: String) -> Result<Vec<Relation>> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_relation_history(&from, &to, &relation_type)).await
    }

    /// Returns the graph as it was at `at` (a Unix timestamp).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_graph_at_time(&self, at: i64) -> Result<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_graph_at_time(at)).await
    }

    /// Returns the current graph with each relation's confidence time-decayed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_decayed_graph(&self, opts: DecayOptions) -> Result<GraphSnapshot> {
        let graph = Arc::clone(&self.graph);
        self.blocking(move || graph.get_decayed_graph(opts)).await
    }

    /// Runs keyword, semantic, or hybrid search, per `opts`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SemanticUnavailable`] under `opts.strict_mode`, or a
    /// store/provider error.
    pub async fn semantic_search(&self, query: String, opts: SearchOptions) -> Result<SearchOutcome> {
        tokio::task::block_in_place(|| self.search.search(&query, &opts))
    }

    /// Reads the vector pointer off an entity's current row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_entity_embedding(&self, name: String) -> Result<Option<Vec<f32>>> {
        let graph = Arc::clone(&self.graph);
        let entity = self.blocking(move || graph.get_entity(&name)).await?;
        Ok(entity.and_then(|e| e.vector))
    }
}
