//! Processing service coordinating extraction, chunking, embedding, and index operations.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::{
    chunking::ChunkStrategy,
    config::Config,
    embedding::{EmbeddingClient, EmbeddingHealth, build_embedding_client},
    extraction::{Document, ExtractorRegistry},
    http::build_client,
    processing::{
        metadata::{chunk_id, chunk_metadata, document_metadata},
        types::{IngestOutcome, KnowledgeBaseStats, ProcessingError, SearchHit},
    },
    qdrant::{
        DeleteOutcome, DeleteSelector, DistanceMetric, IndexError, Match, MetadataFilter,
        QdrantIndex,
    },
};

/// Metadata fields copied into search results.
const PROJECTED_FIELDS: [&str; 6] = [
    "source",
    "file_type",
    "document_type",
    "sector",
    "chunk_index",
    "total_chunks",
];

/// Coordinates the full pipeline: extraction, chunking, embedding, and index writes.
///
/// The service owns long-lived handles to the extractor registry, the embedding client, and the
/// index client. Construct it once near process start and share it by reference; every method
/// takes `&self` so independent documents can be ingested concurrently.
pub struct IngestionService {
    extractors: ExtractorRegistry,
    strategy: ChunkStrategy,
    embedder: Arc<dyn EmbeddingClient>,
    index: QdrantIndex,
    dimension: usize,
    metric: DistanceMetric,
    upsert_batch_size: usize,
    preview_chars: usize,
    default_namespace: String,
}

impl IngestionService {
    /// Assemble a service from already-built components.
    pub fn new(
        config: &Config,
        extractors: ExtractorRegistry,
        embedder: Arc<dyn EmbeddingClient>,
        index: QdrantIndex,
    ) -> Self {
        Self {
            extractors,
            strategy: config.ingestion.chunk_strategy.clone(),
            embedder,
            index,
            dimension: config.index.dimension,
            metric: config.index.metric,
            upsert_batch_size: config.ingestion.upsert_batch_size,
            preview_chars: config.ingestion.content_preview_chars,
            default_namespace: config.index.default_namespace.clone(),
        }
    }

    /// Build every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ProcessingError> {
        let http = build_client(Some(config.ollama.timeout)).map_err(IndexError::from)?;
        let extractors = ExtractorRegistry::from_config(&config.ingestion, http);
        let embedder = build_embedding_client(&config.ollama)?;
        let index = QdrantIndex::from_config(&config.index)?;
        tracing::info!(
            strategy = config.ingestion.chunk_strategy.name(),
            collection = index.collection(),
            "Ingestion service configured"
        );
        Ok(Self::new(config, extractors, embedder, index))
    }

    /// Ensure the backing index exists with the configured dimension and metric.
    pub async fn initialize(&self) -> Result<(), ProcessingError> {
        self.index.ensure_index(self.dimension, self.metric).await?;
        Ok(())
    }

    /// Extractor registry used to read documents.
    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// Namespace used when callers pass `None`.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Ingest one document.
    ///
    /// Failures that belong to the document (unreadable file, unsupported format, no chunks,
    /// rejected upsert) are reported in the returned outcome rather than as errors. When an
    /// upsert batch fails, the earlier batches stay in the index and the outcome's `upserted`
    /// says how many entries were written. Only pipeline-level failures such as an
    /// uninitialized index propagate.
    pub async fn ingest_document(
        &self,
        path: &Path,
        overrides: Option<&Map<String, Value>>,
        namespace: Option<&str>,
    ) -> Result<IngestOutcome, ProcessingError> {
        let source = path.display().to_string();
        let mut chunks = 0;
        match self
            .index_document(path, overrides, self.namespace(namespace), &mut chunks)
            .await
        {
            Ok(upserted) => {
                tracing::info!(source = %source, chunks, upserted, "Document indexed");
                Ok(IngestOutcome::succeeded(source, chunks, upserted))
            }
            Err(error) if error.is_document_failure() => {
                let upserted = match &error {
                    ProcessingError::Index(IndexError::PartialUpsert { upserted, .. }) => {
                        *upserted
                    }
                    _ => 0,
                };
                tracing::warn!(source = %source, chunks, upserted, error = %error, "Document ingestion failed");
                Ok(IngestOutcome::failed(source, chunks, upserted, error.to_string()))
            }
            Err(error) => Err(error),
        }
    }

    async fn index_document(
        &self,
        path: &Path,
        overrides: Option<&Map<String, Value>>,
        namespace: &str,
        chunk_count: &mut usize,
    ) -> Result<usize, ProcessingError> {
        let document = Document::open(path).await?;
        let content = self.extractors.extract(&document).await?;
        let base = document_metadata(&document, &content.metadata, overrides);

        let chunks = self.strategy.chunk(&content.text)?;
        *chunk_count = chunks.len();
        if chunks.is_empty() {
            return Err(ProcessingError::EmptyDocument(document.source()));
        }
        tracing::debug!(
            source = %document.source(),
            strategy = self.strategy.name(),
            chunks = chunks.len(),
            "Chunked document"
        );

        let source = document.source();
        let total = chunks.len();
        let ids: Vec<String> = (0..total).map(|index| chunk_id(&source, index)).collect();
        let vectors = self.embedder.embed_batch(&chunks).await;
        let metadata: Vec<Map<String, Value>> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                chunk_metadata(&base, &source, chunk, index, total, self.preview_chars)
            })
            .collect();

        let upserted = self
            .index
            .upsert_batch(&vectors, &ids, &metadata, self.upsert_batch_size, namespace)
            .await?;
        Ok(upserted)
    }

    /// Embed `query` and return the `top_k` closest chunks. No matches is an empty list.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: Option<&str>,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        let namespace = self.namespace(namespace);
        let vector = self.embedder.embed(query).await?;
        let matches = self.index.query(&vector, top_k, filter, namespace).await?;
        let hits: Vec<SearchHit> = matches.into_iter().map(to_search_hit).collect();
        tracing::info!(namespace, top_k, hits = hits.len(), "Search completed");
        Ok(hits)
    }

    /// Remove every entry whose `source` equals `path`.
    pub async fn delete_document(
        &self,
        path: &Path,
        namespace: Option<&str>,
    ) -> Result<DeleteOutcome, ProcessingError> {
        let source = path.display().to_string();
        let filter = MetadataFilter::new().equals("source", source.as_str());
        let outcome = self
            .index
            .delete(Some(DeleteSelector::Filter(filter)), self.namespace(namespace))
            .await?;
        tracing::info!(source = %source, outcome = ?outcome, "Deleted document");
        Ok(outcome)
    }

    /// Entry count and dimension of `namespace`.
    pub async fn stats(&self, namespace: Option<&str>) -> Result<KnowledgeBaseStats, ProcessingError> {
        let namespace = self.namespace(namespace);
        let stats = self.index.stats(namespace).await?;
        Ok(KnowledgeBaseStats {
            collection: self.index.collection().to_string(),
            namespace: namespace.to_string(),
            entries: stats.count,
            dimension: stats.dimension,
        })
    }

    /// Probe the embedding backend.
    pub async fn embedding_health(&self) -> EmbeddingHealth {
        self.embedder.health_check().await
    }

    fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.default_namespace)
    }
}

fn to_search_hit(found: Match) -> SearchHit {
    let Match {
        id,
        score,
        mut metadata,
    } = found;
    let content = match metadata.remove("content") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let projected = PROJECTED_FIELDS
        .iter()
        .filter_map(|field| {
            metadata
                .remove(*field)
                .map(|value| (field.to_string(), value))
        })
        .collect();
    SearchHit {
        id,
        score,
        content,
        metadata: projected,
    }
}
