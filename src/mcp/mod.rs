//! MCP server implementation.
//!
//! Exposes [`crate::facade::KnowledgeGraph`] as an MCP tool server over
//! stdio, using the `rmcp` crate's tool router.

mod params;
mod server;

use std::sync::Arc;

use rmcp::ServiceExt;
use rmcp::transport::stdio;

pub use server::GraphMcpServer;

use crate::facade::KnowledgeGraph;
use crate::Result;

/// Serves `graph` over MCP on stdin/stdout until the client disconnects.
///
/// # Errors
///
/// Returns an error if the transport fails to start or the server loop
/// exits abnormally.
pub async fn serve_stdio(graph: Arc<KnowledgeGraph>) -> Result<()> {
    let service = GraphMcpServer::new(graph)
        .serve(stdio())
        .await
        .map_err(|e| crate::Error::OperationFailed {
            operation: "mcp_serve_stdio".to_string(),
            cause: e.to_string(),
        })?;
    service.waiting().await.map_err(|e| crate::Error::OperationFailed {
        operation: "mcp_serve_stdio".to_string(),
        cause: e.to_string(),
    })?;
    Ok(())
}
