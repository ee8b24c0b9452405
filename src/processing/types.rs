//! Core data types and error definitions for the processing pipeline.

use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

use crate::{
    chunking::ChunkingError, embedding::EmbeddingError, extraction::ExtractionError,
    qdrant::IndexError,
};

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The document could not be read or parsed.
    #[error("Failed to extract document: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Chunking produced nothing to index.
    #[error("Document produced no chunks: {0}")]
    EmptyDocument(String),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index interaction failed.
    #[error("Index request failed: {0}")]
    Index(#[from] IndexError),
    /// The raw-data directory could not be scanned.
    #[error("Cannot scan {path}: {reason}")]
    Discovery {
        /// Directory being scanned.
        path: PathBuf,
        /// Why the scan failed.
        reason: String,
    },
}

impl ProcessingError {
    /// Whether the failure belongs to one document rather than to the pipeline itself.
    ///
    /// Expected failures are reported in an [`IngestOutcome`]; the rest propagate.
    pub fn is_document_failure(&self) -> bool {
        !matches!(
            self,
            Self::Index(
                IndexError::NotInitialized(_)
                    | IndexError::InvalidUrl(_)
                    | IndexError::DimensionMismatch { .. }
            )
                | Self::Discovery { .. }
        )
    }
}

/// Result of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Path of the document.
    pub source: String,
    /// Whether every chunk was written.
    pub success: bool,
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Entries acknowledged by the index.
    pub upserted: usize,
    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl IngestOutcome {
    pub(crate) fn succeeded(source: String, chunks: usize, upserted: usize) -> Self {
        Self {
            source,
            success: true,
            chunks,
            upserted,
            error: None,
        }
    }

    pub(crate) fn failed(source: String, chunks: usize, upserted: usize, error: String) -> Self {
        Self {
            source,
            success: false,
            chunks,
            upserted,
            error: Some(error),
        }
    }
}

/// One search result shaped for callers.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Identifier of the chunk entry.
    pub id: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Stored content preview.
    pub content: String,
    /// Provenance fields projected from the stored metadata.
    pub metadata: Map<String, Value>,
}

/// Aggregate result of ingesting a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Documents discovered.
    pub total: usize,
    /// Documents fully indexed.
    pub succeeded: usize,
    /// Documents that failed.
    pub failed: usize,
    /// Chunks produced across all documents.
    pub total_chunks: usize,
    /// Entries acknowledged across all documents.
    pub total_upserted: usize,
    /// Failed documents with their reasons.
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, path: PathBuf, outcome: &IngestOutcome) {
        self.total_chunks += outcome.chunks;
        self.total_upserted += outcome.upserted;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.failures.push((
                path,
                outcome.error.clone().unwrap_or_else(|| "unknown error".into()),
            ));
        }
    }
}

/// Knowledge-base counters for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseStats {
    /// Collection backing the index.
    pub collection: String,
    /// Namespace the counts refer to.
    pub namespace: String,
    /// Entries stored in the namespace.
    pub entries: u64,
    /// Vector dimension of the collection.
    pub dimension: Option<usize>,
}
