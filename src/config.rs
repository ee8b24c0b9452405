//! Environment-driven configuration.
//!
//! `Config::from_env` is called once at process start and the resulting value is handed by
//! reference to every component constructor. Validation happens here so the pipeline can trust
//! the values it receives.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::chunking::ChunkStrategy;
use crate::qdrant::DistanceMetric;
use crate::retry::RetryPolicy;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {reason}")]
    InvalidValue {
        /// Name of the offending variable.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Runtime configuration for the ingestion and retrieval pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Document ingestion settings.
    pub ingestion: IngestionConfig,
    /// Ollama embedding and generation settings.
    pub ollama: OllamaConfig,
    /// Vector index settings.
    pub index: IndexConfig,
}

/// Settings that shape extraction, chunking, and upserts.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Directory scanned by batch ingestion.
    pub raw_data_dir: PathBuf,
    /// Chunking strategy applied to every document.
    pub chunk_strategy: ChunkStrategy,
    /// Number of entries sent to the index per upsert call.
    pub upsert_batch_size: usize,
    /// Documents processed concurrently during batch ingestion.
    pub workers: usize,
    /// Whether empty PDFs are handed to the OCR capability.
    pub ocr_enabled: bool,
    /// Endpoint of the OCR service, when one is deployed.
    pub ocr_endpoint: Option<String>,
    /// Bearer token for the OCR service.
    pub ocr_api_key: Option<String>,
    /// Number of characters of chunk text stored as the `content` preview.
    pub content_preview_chars: usize,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic byte-hash vectors; no network access.
    Hashing,
}

/// Settings for the Ollama HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Embedding backend selection.
    pub embedding_provider: EmbeddingProvider,
    /// Base URL of the Ollama runtime.
    pub base_url: String,
    /// Model used for `/api/embeddings`.
    pub embedding_model: String,
    /// Dimension every embedding must have.
    pub embedding_dimension: usize,
    /// Model used for `/api/chat`.
    pub generation_model: String,
    /// Sampling temperature for chat completions.
    pub temperature: f32,
    /// Maximum tokens generated per completion (`num_predict`).
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy applied to every Ollama call.
    pub retry: RetryPolicy,
}

/// Settings for the Qdrant collection backing the index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Base URL of the Qdrant instance.
    pub url: String,
    /// Optional API key sent as the `api-key` header.
    pub api_key: Option<String>,
    /// Collection holding every namespace.
    pub collection: String,
    /// Vector dimension used when creating the collection.
    pub dimension: usize,
    /// Similarity metric used when creating the collection.
    pub metric: DistanceMetric,
    /// Namespace used when callers do not pick one.
    pub default_namespace: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_dimension = parse_or("EMBEDDING_DIMENSION", 768usize)?;
        if embedding_dimension == 0 {
            return Err(invalid("EMBEDDING_DIMENSION", "must be greater than zero"));
        }

        let config = Self {
            ingestion: IngestionConfig {
                raw_data_dir: load_env_optional("RAW_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/raw")),
                chunk_strategy: load_chunk_strategy()?,
                upsert_batch_size: parse_or("UPSERT_BATCH_SIZE", 100usize)?,
                workers: parse_or("INGEST_WORKERS", 4usize)?,
                ocr_enabled: parse_or("OCR_ENABLED", true)?,
                ocr_endpoint: load_env_optional("OCR_ENDPOINT"),
                ocr_api_key: load_env_optional("OCR_API_KEY"),
                content_preview_chars: parse_or("CONTENT_PREVIEW_CHARS", 500usize)?,
            },
            ollama: OllamaConfig {
                embedding_provider: parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Ollama)?,
                base_url: load_env_optional("OLLAMA_URL")
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                embedding_model: load_env_optional("EMBEDDING_MODEL")
                    .unwrap_or_else(|| "nomic-embed-text".to_string()),
                embedding_dimension,
                generation_model: load_env_optional("GENERATION_MODEL")
                    .unwrap_or_else(|| "qwen2.5:14b".to_string()),
                temperature: parse_or("GENERATION_TEMPERATURE", 0.7f32)?,
                max_tokens: parse_or("GENERATION_MAX_TOKENS", 2048u32)?,
                timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 120u64)?),
                retry: load_retry_policy()?,
            },
            index: IndexConfig {
                url: load_env("QDRANT_URL")?,
                api_key: load_env_optional("QDRANT_API_KEY"),
                collection: load_env("QDRANT_COLLECTION_NAME")?,
                dimension: embedding_dimension,
                metric: parse_or("INDEX_METRIC", DistanceMetric::Cosine)?,
                default_namespace: load_env_optional("INDEX_NAMESPACE").unwrap_or_default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ingestion = &self.ingestion;
        if ingestion.upsert_batch_size == 0 {
            return Err(invalid("UPSERT_BATCH_SIZE", "must be at least 1"));
        }
        if ingestion.workers == 0 {
            return Err(invalid("INGEST_WORKERS", "must be at least 1"));
        }
        if ingestion.content_preview_chars == 0 {
            return Err(invalid("CONTENT_PREVIEW_CHARS", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(invalid("GENERATION_TEMPERATURE", "must be within 0.0..=2.0"));
        }
        Ok(())
    }
}

/// `RetryPolicy::new` clamps attempts to one, so a zero is rejected before it gets there.
fn load_retry_policy() -> Result<RetryPolicy, ConfigError> {
    let max_attempts = parse_or("HTTP_MAX_ATTEMPTS", 3usize)?;
    if max_attempts == 0 {
        return Err(invalid("HTTP_MAX_ATTEMPTS", "must be at least 1"));
    }
    let backoff = Duration::from_millis(parse_or("HTTP_BACKOFF_MS", 2000u64)?);
    Ok(RetryPolicy::new(max_attempts, backoff))
}

fn load_chunk_strategy() -> Result<ChunkStrategy, ConfigError> {
    let name = load_env_optional("CHUNK_STRATEGY").unwrap_or_else(|| "semantic".to_string());
    let strategy = match name.to_lowercase().as_str() {
        "fixed" => ChunkStrategy::FixedSize {
            size: parse_or("CHUNK_SIZE", 1000usize)?,
            overlap: parse_or("CHUNK_OVERLAP", 200usize)?,
        },
        "semantic" => ChunkStrategy::Semantic {
            max: parse_or("SEMANTIC_MAX_CHUNK_SIZE", 1500usize)?,
            min: parse_or("SEMANTIC_MIN_CHUNK_SIZE", 500usize)?,
        },
        "recursive" => ChunkStrategy::recursive(
            parse_or("CHUNK_SIZE", 1000usize)?,
            parse_or("CHUNK_OVERLAP", 200usize)?,
        ),
        other => {
            return Err(invalid(
                "CHUNK_STRATEGY",
                &format!("unknown strategy '{other}' (expected fixed, semantic, or recursive)"),
            ));
        }
    };
    strategy
        .validate()
        .map_err(|err| invalid("CHUNK_STRATEGY", &err.to_string()))?;
    Ok(strategy)
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match load_env_optional(key) {
        Some(raw) => raw.parse().map_err(|err: T::Err| invalid(key, &err.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            other => Err(format!("unknown embedding provider '{other}'")),
        }
    }
}

/// Load `.env` (when present) and build the configuration from the environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.index.url,
        collection = %config.index.collection,
        metric = ?config.index.metric,
        embedding_provider = ?config.ollama.embedding_provider,
        embedding_model = %config.ollama.embedding_model,
        dimension = config.ollama.embedding_dimension,
        strategy = ?config.ingestion.chunk_strategy,
        "Loaded configuration"
    );
    Ok(config)
}
