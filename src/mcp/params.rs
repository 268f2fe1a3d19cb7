//! Wire-format parameter types for each MCP tool.
//!
//! Kept distinct from the internal [`crate::storage::traits`] types: tool
//! parameters need a JSON Schema ([`schemars::JsonSchema`]) for the MCP tool
//! listing, while the internal types carry richer invariants (e.g.
//! [`crate::models::Metadata`]'s untagged recursive shape) that don't need
//! to leak into the wire contract. Conversion happens once, at the
//! dispatch boundary in [`super::server`].

use schemars::JsonSchema;
use serde::Deserialize;

use crate::models::Metadata;
use crate::storage::traits::{DecayOptions, EntityInput, ObservationDelta, RelationInput, RelationKey};

fn metadata_from_json(value: Option<serde_json::Value>) -> Metadata {
    value.and_then(|v| serde_json::from_value(v).ok()).unwrap_or_default()
}

/// One entity to create or version.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntitySpec {
    /// The entity's name.
    pub name: String,
    /// A free-form type tag (e.g. `"person"`, `"project"`).
    pub entity_type: String,
    /// Observations to seed or merge into the entity.
    #[serde(default)]
    pub observations: Vec<String>,
}

impl From<EntitySpec> for EntityInput {
    fn from(spec: EntitySpec) -> Self {
        Self {
            name: spec.name,
            entity_type: spec.entity_type,
            observations: spec.observations,
        }
    }
}

/// Parameters for `create_entities`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateEntitiesParams {
    /// Entities to create or version.
    pub entities: Vec<EntitySpec>,
}

/// One entity's observations to add or remove.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ObservationSpec {
    /// The entity's name.
    pub entity_name: String,
    /// The observation strings.
    pub contents: Vec<String>,
}

impl From<ObservationSpec> for ObservationDelta {
    fn from(spec: ObservationSpec) -> Self {
        Self {
            entity_name: spec.entity_name,
            contents: spec.contents,
        }
    }
}

/// Parameters for `add_observations` and `delete_observations`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ObservationBatchParams {
    /// Observation deltas, one per affected entity.
    pub observations: Vec<ObservationSpec>,
}

/// Parameters for `delete_entities`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntityNamesParams {
    /// Names of entities to soft-delete.
    pub names: Vec<String>,
}

/// One relation to create.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelationSpec {
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
    /// Arbitrary structured metadata.
    pub metadata: Option<serde_json::Value>,
}

impl From<RelationSpec> for RelationInput {
    fn from(spec: RelationSpec) -> Self {
        Self {
            from: spec.from,
            to: spec.to,
            relation_type: spec.relation_type,
            strength: spec.strength,
            confidence: spec.confidence,
            metadata: metadata_from_json(spec.metadata),
        }
    }
}

/// Parameters for `create_relations`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateRelationsParams {
    /// Relations to create.
    pub relations: Vec<RelationSpec>,
}

/// Identifies a current relation by its endpoints and type.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelationKeySpec {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag.
    pub relation_type: String,
}

impl From<RelationKeySpec> for RelationKey {
    fn from(spec: RelationKeySpec) -> Self {
        Self {
            from: spec.from,
            to: spec.to,
            relation_type: spec.relation_type,
        }
    }
}

/// Parameters for `get_relation` and `get_relation_history`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelationLookupParams {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag.
    pub relation_type: String,
}

/// Parameters for `update_relation`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateRelationParams {
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag.
    pub relation_type: String,
    /// Relative strength, in `[0, 1]`.
    pub strength: f32,
    /// Confidence, in `[0, 1]`.
    pub confidence: f32,
    /// Arbitrary structured metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Parameters for `delete_relations`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteRelationsParams {
    /// Relations to soft-delete, identified by endpoints and type.
    pub relations: Vec<RelationKeySpec>,
}

/// Parameters for `search_nodes`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SubstringQueryParams {
    /// Substring to match against entity names and relation endpoints.
    pub query: String,
}

/// Parameters for `open_nodes`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OpenNodesParams {
    /// Entity names to fetch, plus relations between them.
    pub names: Vec<String>,
}

/// Parameters for `get_entity_history` and `get_entity_embedding`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EntityNameParams {
    /// The entity's name.
    pub name: String,
}

/// Parameters for `get_graph_at_time`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AtTimeParams {
    /// Unix timestamp (seconds) to reconstruct the graph at.
    pub at: i64,
}

/// Parameters for `get_decayed_graph`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DecayedGraphParams {
    /// Days for a relation's confidence to halve; defaults to 30.
    pub half_life_days: Option<f64>,
    /// Confidence floor below which decay never pushes a relation; defaults to 0.1.
    pub min_floor: Option<f32>,
}

impl From<DecayedGraphParams> for DecayOptions {
    fn from(params: DecayedGraphParams) -> Self {
        let default = Self::default();
        Self {
            half_life_days: params.half_life_days.unwrap_or(default.half_life_days),
            min_floor: params.min_floor.unwrap_or(default.min_floor),
        }
    }
}

/// Parameters for `semantic_search`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SemanticSearchParams {
    /// The search query text.
    pub query: String,
    /// `"keyword"`, `"semantic"`, or `"hybrid"`; defaults to `"keyword"`.
    #[serde(default)]
    pub search_type: Option<String>,
    /// Maximum results returned; defaults to 10.
    pub limit: Option<usize>,
    /// Minimum similarity score for semantic/hybrid results; defaults to 0.0.
    pub min_similarity: Option<f32>,
    /// Restrict results to these entity types.
    #[serde(default)]
    pub entity_types: Vec<String>,
    /// If `true`, raise rather than silently fall back to keyword search.
    #[serde(default)]
    pub strict_mode: bool,
    /// Weight given to the vector score in hybrid mode; defaults to 0.6.
    pub semantic_weight: Option<f32>,
}
