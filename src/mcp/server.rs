//! MCP tool dispatch: one `#[tool]` method per entry in the external tool
//! table, each deserializing its wire-format parameters (see
//! [`super::params`]), calling into [`KnowledgeGraph`], and serializing the
//! result back to JSON.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::facade::KnowledgeGraph;
use crate::search::{SearchOptions, SearchType};

use super::params::{
    AtTimeParams, CreateEntitiesParams, CreateRelationsParams, DecayedGraphParams, DeleteRelationsParams,
    EntityNameParams, EntityNamesParams, ObservationBatchParams, OpenNodesParams, RelationLookupParams,
    SemanticSearchParams, SubstringQueryParams, UpdateRelationParams,
};

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn op_error<E: std::fmt::Display>(e: E) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

fn parse_search_type(raw: Option<&str>) -> SearchType {
    match raw {
        Some("semantic") => SearchType::Semantic,
        Some("hybrid") => SearchType::Hybrid,
        _ => SearchType::Keyword,
    }
}

/// MCP server state: a thin wrapper over [`KnowledgeGraph`].
#[derive(Clone)]
pub struct GraphMcpServer {
    graph: Arc<KnowledgeGraph>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GraphMcpServer {
    /// Builds a server dispatching onto the given facade.
    pub fn new(graph: Arc<KnowledgeGraph>) -> Self {
        Self {
            graph,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Create entities, or add a new version to existing ones.")]
    pub async fn create_entities(&self, Parameters(params): Parameters<CreateEntitiesParams>) -> Result<CallToolResult, McpError> {
        let inputs = params.entities.into_iter().map(Into::into).collect();
        let created = self.graph.create_entities(inputs).await.map_err(op_error)?;
        json_result(&created)
    }

    #[tool(description = "Merge new observations into existing entities.")]
    pub async fn add_observations(
        &self,
        Parameters(params): Parameters<ObservationBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        let deltas = params.observations.into_iter().map(Into::into).collect();
        let added = self.graph.add_observations(deltas).await.map_err(op_error)?;
        json_result(&added)
    }

    #[tool(description = "Remove observations from entities.")]
    pub async fn delete_observations(
        &self,
        Parameters(params): Parameters<ObservationBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        let deltas = params.observations.into_iter().map(Into::into).collect();
        self.graph.delete_observations(deltas).await.map_err(op_error)?;
        json_result(&serde_json::json!({ "status": "ok" }))
    }

    #[tool(description = "Soft-delete entities and their current relations.")]
    pub async fn delete_entities(&self, Parameters(params): Parameters<EntityNamesParams>) -> Result<CallToolResult, McpError> {
        self.graph.delete_entities(params.names).await.map_err(op_error)?;
        json_result(&serde_json::json!({ "status": "ok" }))
    }

    #[tool(description = "Create relations between currently-valid entities.")]
    pub async fn create_relations(
        &self,
        Parameters(params): Parameters<CreateRelationsParams>,
    ) -> Result<CallToolResult, McpError> {
        let relations = params.relations.into_iter().map(Into::into).collect();
        let created = self.graph.create_relations(relations).await.map_err(op_error)?;
        json_result(&created)
    }

    #[tool(description = "Fetch the current relation matching the given endpoints and type, if any.")]
    pub async fn get_relation(&self, Parameters(params): Parameters<RelationLookupParams>) -> Result<CallToolResult, McpError> {
        let relation = self
            .graph
            .get_relation(params.from, params.to, params.relation_type)
            .await
            .map_err(op_error)?;
        json_result(&relation)
    }

    #[tool(description = "Replace the current relation matching the given identity with new field values.")]
    pub async fn update_relation(
        &self,
        Parameters(params): Parameters<UpdateRelationParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut relation = crate::models::Relation::new(params.from, params.to, params.relation_type);
        relation.strength = params.strength;
        relation.confidence = params.confidence;
        relation.metadata = params
            .metadata
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let updated = self.graph.update_relation(relation).await.map_err(op_error)?;
        json_result(&updated)
    }

    #[tool(description = "Soft-delete relations identified by endpoints and type.")]
    pub async fn delete_relations(
        &self,
        Parameters(params): Parameters<DeleteRelationsParams>,
    ) -> Result<CallToolResult, McpError> {
        let keys = params.relations.into_iter().map(Into::into).collect();
        self.graph.delete_relations(keys).await.map_err(op_error)?;
        json_result(&serde_json::json!({ "status": "ok" }))
    }

    #[tool(description = "Return the full current graph: every current entity and relation.")]
    pub async fn read_graph(&self) -> Result<CallToolResult, McpError> {
        let snapshot = self.graph.load_graph().await.map_err(op_error)?;
        json_result(&snapshot)
    }

    #[tool(description = "Keyword search: entities/relations whose name or endpoint contains the query substring.")]
    pub async fn search_nodes(&self, Parameters(params): Parameters<SubstringQueryParams>) -> Result<CallToolResult, McpError> {
        let snapshot = self.graph.search_nodes(params.query).await.map_err(op_error)?;
        json_result(&snapshot)
    }

    #[tool(description = "Fetch specific entities by name, plus the current relations between them.")]
    pub async fn open_nodes(&self, Parameters(params): Parameters<OpenNodesParams>) -> Result<CallToolResult, McpError> {
        let snapshot = self.graph.open_nodes(params.names).await.map_err(op_error)?;
        json_result(&snapshot)
    }

    #[tool(description = "Keyword, semantic, or hybrid search with an explicit fallback ladder and diagnostics.")]
    pub async fn semantic_search(
        &self,
        Parameters(params): Parameters<SemanticSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let defaults = SearchOptions::default();
        let opts = SearchOptions {
            requested: parse_search_type(params.search_type.as_deref()),
            limit: params.limit.unwrap_or(defaults.limit),
            min_similarity: params.min_similarity.unwrap_or(defaults.min_similarity),
            entity_types: params.entity_types,
            strict_mode: params.strict_mode,
            semantic_weight: params.semantic_weight.unwrap_or(defaults.semantic_weight),
        };
        let outcome = self.graph.semantic_search(params.query, opts).await.map_err(op_error)?;
        json_result(&outcome)
    }

    #[tool(description = "Read the stored embedding vector for an entity, if one has been generated.")]
    pub async fn get_entity_embedding(
        &self,
        Parameters(params): Parameters<EntityNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let vector = self.graph.get_entity_embedding(params.name).await.map_err(op_error)?;
        json_result(&vector)
    }

    #[tool(description = "Return every historical version of an entity, oldest first.")]
    pub async fn get_entity_history(
        &self,
        Parameters(params): Parameters<EntityNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let history = self.graph.get_entity_history(params.name).await.map_err(op_error)?;
        json_result(&history)
    }

    #[tool(description = "Return every historical version of a relation, oldest first.")]
    pub async fn get_relation_history(
        &self,
        Parameters(params): Parameters<RelationLookupParams>,
    ) -> Result<CallToolResult, McpError> {
        let history = self
            .graph
            .get_relation_history(params.from, params.to, params.relation_type)
            .await
            .map_err(op_error)?;
        json_result(&history)
    }

    #[tool(description = "Reconstruct the graph as it existed at a past Unix timestamp (seconds).")]
    pub async fn get_graph_at_time(&self, Parameters(params): Parameters<AtTimeParams>) -> Result<CallToolResult, McpError> {
        let snapshot = self.graph.get_graph_at_time(params.at).await.map_err(op_error)?;
        json_result(&snapshot)
    }

    #[tool(description = "Return the current graph with each relation's confidence time-decayed.")]
    pub async fn get_decayed_graph(
        &self,
        Parameters(params): Parameters<DecayedGraphParams>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self.graph.get_decayed_graph(params.into()).await.map_err(op_error)?;
        json_result(&snapshot)
    }
}

#[tool_handler]
impl ServerHandler for GraphMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "subcog-graph".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "A durable, semantic knowledge-graph memory service. Entities and relations are \
                 bitemporally versioned; mutations enqueue background embedding jobs so semantic \
                 and hybrid search stay current without blocking the calling tool."
                    .to_string(),
            ),
        }
    }
}
