use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingClient, EmbeddingError};
use crate::config::OllamaConfig;
use crate::http::{build_client, format_endpoint, normalize_base_url};
use crate::retry::{RetryPolicy, send_with_retry};

/// Embedding client for Ollama's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingClient {
    /// Build a client from the Ollama settings.
    pub fn from_config(config: &OllamaConfig) -> Result<Self, EmbeddingError> {
        let base_url =
            normalize_base_url(&config.base_url).map_err(EmbeddingError::Configuration)?;
        let http = build_client(Some(config.timeout))?;
        tracing::info!(
            url = %base_url,
            model = %config.embedding_model,
            dimension = config.embedding_dimension,
            "Initialized Ollama embedding client"
        );
        Ok(Self {
            http,
            endpoint: format_endpoint(&base_url, "api/embeddings"),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
            retry: config.retry,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response = send_with_retry(&self.retry, "ollama.embeddings", || {
            self.http.post(&self.endpoint).json(&body)
        })
        .await
        .map_err(|failure| EmbeddingError::ServiceUnavailable(failure.to_string()))?;

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))?;

        if payload.embedding.len() != self.dimension {
            tracing::warn!(
                model = %self.model,
                expected = self.dimension,
                actual = payload.embedding.len(),
                "Unexpected embedding dimension"
            );
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: payload.embedding.len(),
            });
        }
        Ok(payload.embedding)
    }
}
