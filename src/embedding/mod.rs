//! Embedding backends.
//!
//! [`EmbeddingClient::embed`] is strict: transport failures and wrong-length vectors are
//! errors. [`EmbeddingClient::embed_batch`] isolates failures per item and substitutes a zero
//! vector so the output stays aligned with the caller's chunk and id arrays.

mod hashing;
mod ollama;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{EmbeddingProvider, OllamaConfig};

pub use hashing::HashingEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;

/// Text embedded by health checks.
pub const HEALTH_PROBE: &str = "test";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The service could not be reached or kept failing after retries.
    #[error("Embedding service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The model returned a vector of unexpected length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Length actually returned.
        actual: usize,
    },
    /// The service answered with a body that is not an embedding.
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    /// The HTTP client could not be constructed.
    #[error("Failed to build embedding HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// Configuration cannot produce embeddings.
    #[error("Invalid embedding configuration: {0}")]
    Configuration(String),
}

/// Result of probing an embedding backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingHealth {
    /// Whether the probe produced a vector of the configured dimension.
    pub healthy: bool,
    /// Length of the probe vector, when one came back.
    pub dimension: Option<usize>,
    /// Failure description when unhealthy.
    pub error: Option<String>,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Dimension every returned vector has.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed each text independently, in order.
    ///
    /// A failing item is logged and replaced by a zero vector of [`Self::dimension`]; the
    /// returned list always has `texts.len()` entries. A zero vector is not neutral under
    /// cosine similarity, so callers that care should inspect the log.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        let mut failed = 0usize;
        for (index, text) in texts.iter().enumerate() {
            match self.embed(text).await {
                Ok(vector) => vectors.push(vector),
                Err(error) => {
                    failed += 1;
                    tracing::warn!(index, error = %error, "Embedding failed; substituting zero vector");
                    vectors.push(vec![0.0; self.dimension()]);
                }
            }
        }
        tracing::debug!(total = texts.len(), failed, "Embedded batch");
        vectors
    }

    /// Embed [`HEALTH_PROBE`] and check the returned dimension.
    async fn health_check(&self) -> EmbeddingHealth {
        match self.embed(HEALTH_PROBE).await {
            Ok(vector) => EmbeddingHealth {
                healthy: vector.len() == self.dimension(),
                dimension: Some(vector.len()),
                error: None,
            },
            Err(error) => {
                tracing::error!(error = %error, "Embedding health check failed");
                EmbeddingHealth {
                    healthy: false,
                    dimension: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

/// Build the embedding client selected by `EMBEDDING_PROVIDER`.
pub fn build_embedding_client(
    config: &OllamaConfig,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingError> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbeddingClient::from_config(config)?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbeddingClient::new(
            config.embedding_dimension,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails on any text containing "fail".
    struct Flaky;

    #[async_trait]
    impl EmbeddingClient for Flaky {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("fail") {
                Err(EmbeddingError::ServiceUnavailable("boom".into()))
            } else {
                Ok(vec![1.0; 4])
            }
        }
    }

    #[tokio::test]
    async fn batch_isolates_failures_with_zero_vectors() {
        let texts: Vec<String> = ["a", "b", "fail here", "d", "e"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let vectors = Flaky.embed_batch(&texts).await;

        assert_eq!(vectors.len(), 5);
        assert!(vectors.iter().all(|vector| vector.len() == 4));
        assert_eq!(vectors[2], vec![0.0; 4]);
        assert_eq!(vectors[0], vec![1.0; 4]);
        assert_eq!(vectors[4], vec![1.0; 4]);
    }

    #[tokio::test]
    async fn health_check_reports_probe_outcome() {
        let healthy = Flaky.health_check().await;
        assert_eq!(
            healthy,
            EmbeddingHealth {
                healthy: true,
                dimension: Some(4),
                error: None
            }
        );
    }
}
