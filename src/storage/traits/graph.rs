//! `GraphStore` trait: the bitemporal property-graph engine's public contract.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::models::{Entity, Metadata, Relation};

/// Input to [`GraphStore::create_entities`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInput {
    /// The entity's name.
    pub name: String,
    /// A free-form type tag.
    pub entity_type: String,
    /// Observations to seed or merge into the entity.
    pub observations: Vec<String>,
}

/// A request to add or remove a set of observations for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDelta {
    /// The entity's name.
    pub entity_name: String,
    /// The observation strings to add or remove.
    pub contents: Vec<String>,
}

/// The result of successfully adding observations to one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationsAdded {
    /// The entity's name.
    pub entity_name: String,
    /// The observations that were actually new (and thus appended).
    pub added_observations: Vec<String>,
}

/// Input to [`GraphStore::create_relations`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationInput {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag.
    pub relation_type: String,
    /// Relative strength, in `[0, 1]`.
    pub strength: Option<f32>,
    /// Confidence, in `[0, 1]`.
    pub confidence: Option<f32>,
    /// Optional structured metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Identifies a current relation by its endpoints and type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationKey {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag.
    pub relation_type: String,
}

/// A snapshot of (a subset of) the graph: entities plus the relations among them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Entities in this snapshot.
    pub entities: Vec<Entity>,
    /// Relations in this snapshot.
    pub relations: Vec<Relation>,
}

/// Options controlling [`GraphStore::get_decayed_graph`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecayOptions {
    /// Days for a relation's confidence to halve. Default 30.
    pub half_life_days: f64,
    /// Confidence never decays below this floor. Default 0.1.
    pub min_floor: f32,
}

impl Default for DecayOptions {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            min_floor: 0.1,
        }
    }
}

/// The bitemporal property-graph engine.
///
/// Every mutating method is transactional: either the whole operation is
/// visible afterward, or none of it is. Implementations must uphold, at
/// every externally observable point:
///
/// - **Current uniqueness**: at most one row per entity name has
///   `valid_to = None`.
/// - **No phantom relations**: any relation with `valid_to = None` connects
///   two entity rows that also have `valid_to = None`.
/// - **Temporal monotonicity**: an entity's `version` strictly increases
///   across its history, with no gaps or overlaps in validity.
///
/// Methods are synchronous; callers that run on an async executor should
/// invoke them through `tokio::task::spawn_blocking` (the facade does this).
pub trait GraphStore: Send + Sync {
    /// Creates or versions entities. Returns only entities whose state
    /// effectively changed; an input identical to the current version is a
    /// no-op and is omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn create_entities(&self, inputs: Vec<EntityInput>) -> Result<Vec<Entity>>;

    /// Merges new observations into each named entity, producing a new
    /// version. Entities not found are skipped (not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn add_observations(&self, deltas: Vec<ObservationDelta>) -> Result<Vec<ObservationsAdded>>;

    /// Removes observations from each named entity, producing a new
    /// version. Entities not found are skipped (not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn delete_observations(&self, deletions: Vec<ObservationDelta>) -> Result<()>;

    /// Soft-deletes entities and cascades to their current edges. Missing
    /// names are skipped (not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn delete_entities(&self, names: &[String]) -> Result<()>;

    /// Creates relations between currently-valid endpoints. Relations whose
    /// endpoints are not both current are skipped (not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn create_relations(&self, relations: Vec<RelationInput>) -> Result<Vec<Relation>>;

    /// Replaces the current edge matching `relation`'s identity with a new
    /// version carrying its updated fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EntityNotCurrent`] if either endpoint is not
    /// currently valid, or an error if the transaction fails.
    fn update_relation(&self, relation: Relation) -> Result<Relation>;

    /// Soft-deletes the current edges matching each key. Already-archived
    /// edges are skipped (not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn delete_relations(&self, relations: &[RelationKey]) -> Result<()>;

    /// Returns the current edge matching `from`, `to`, `relation_type`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<Option<Relation>>;

    /// Returns the full current graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn load_graph(&self) -> Result<GraphSnapshot>;

    /// Returns the current version of one entity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    /// Returns the current entities and relations whose name/endpoint
    /// contains `substring` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search_nodes(&self, substring: &str) -> Result<GraphSnapshot>;

    /// Returns the current entities named in `names`, plus the current
    /// relations between them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn open_nodes(&self, names: &[String]) -> Result<GraphSnapshot>;

    /// Returns every version of the named entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_entity_history(&self, name: &str) -> Result<Vec<Entity>>;

    /// Returns every version of the named relation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_relation_history(&self, from: &str, to: &str, relation_type: &str) -> Result<Vec<Relation>>;

    /// Returns the graph as it was at `at` (a Unix timestamp): entities and
    /// relations whose own interval, and (for relations) both endpoints'
    /// intervals, all cover `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_graph_at_time(&self, at: i64) -> Result<GraphSnapshot>;

    /// Returns the current graph with each relation's confidence replaced
    /// by its time-decayed value (see [`Relation::decay_confidence`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_decayed_graph(&self, opts: DecayOptions) -> Result<GraphSnapshot>;

    /// Physically deletes archived entity rows with `valid_to < cutoff`.
    /// Never touches current rows. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn purge_archived_entities(&self, cutoff: i64) -> Result<u64>;

    /// Physically deletes archived relation rows with `valid_to < cutoff`.
    /// Never touches current rows. Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transaction fails.
    fn purge_archived_relations(&self, cutoff: i64) -> Result<u64>;
}
