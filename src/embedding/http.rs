//! HTTP-based embedding provider, targeting an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::Embedder;
use crate::{Error, Result};

/// Calls a remote embeddings endpoint.
///
/// `embed` drives the async [`reqwest::Client`] on the current Tokio
/// runtime via [`tokio::runtime::Handle::block_on`]. Callers invoke it
/// through `tokio::task::spawn_blocking` (the `EmbeddingWorker` does this),
/// which keeps the blocking wait off the async scheduler.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Builds a provider targeting `endpoint` (e.g. `https://api.openai.com/v1/embeddings`).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: SecretString, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimensions,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| Error::OperationFailed {
            operation: "embed_http".to_string(),
            cause: format!("no tokio runtime available: {e}"),
        })?;
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.expose_secret().to_string();
        let model = self.model.clone();
        let client = self.client.clone();
        let text = text.to_string();
        handle.block_on(async move {
            let response = client
                .post(&endpoint)
                .bearer_auth(&api_key)
                .json(&serde_json::json!({ "model": model, "input": text }))
                .send()
                .await
                .map_err(|e| Error::OperationFailed {
                    operation: "embed_http_request".to_string(),
                    cause: e.to_string(),
                })?;
            let response = response.error_for_status().map_err(|e| Error::OperationFailed {
                operation: "embed_http_status".to_string(),
                cause: e.to_string(),
            })?;
            let parsed: EmbeddingResponse = response.json().await.map_err(|e| Error::OperationFailed {
                operation: "embed_http_parse".to_string(),
                cause: e.to_string(),
            })?;
            parsed
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or_else(|| Error::OperationFailed {
                    operation: "embed_http_empty".to_string(),
                    cause: "provider returned no embeddings".to_string(),
                })
        })
    }
}
