//! Shared types used by the Qdrant index client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

use super::filters::MetadataFilter;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant rejected the operation.
    #[error("Index operation failed ({status}): {body}")]
    OperationFailure {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// An operation ran before `ensure_index`.
    #[error("Index '{0}' has not been initialized; call ensure_index first")]
    NotInitialized(String),
    /// Delete was called with an empty id list or empty filter.
    #[error("Invalid deletion request: {0}")]
    InvalidDeletionRequest(String),
    /// Vectors, ids, and metadata differ in length.
    #[error("Upsert inputs differ in length: {vectors} vectors, {ids} ids, {metadata} metadata records")]
    LengthMismatch {
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of ids supplied.
        ids: usize,
        /// Number of metadata records supplied.
        metadata: usize,
    },
    /// A batch failed after earlier batches were written. Those entries stay in the index.
    #[error("Upsert stopped after {upserted} entries were written: {source}")]
    PartialUpsert {
        /// Entries acknowledged before the failing batch.
        upserted: usize,
        /// Failure of the rejected batch.
        #[source]
        source: Box<IndexError>,
    },
    /// The collection exists with a vector size other than the configured dimension.
    #[error("Collection '{collection}' stores {existing}-dimensional vectors but {requested} were requested")]
    DimensionMismatch {
        /// Collection name.
        collection: String,
        /// Vector size of the existing collection.
        existing: usize,
        /// Dimension passed to `ensure_index`.
        requested: usize,
    },
    /// Qdrant answered with a body we could not interpret.
    #[error("Unexpected Qdrant response: {0}")]
    InvalidResponse(String),
}

/// Similarity metric used by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Cosine similarity.
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean distance.
    Euclid,
}

impl DistanceMetric {
    /// Name Qdrant expects in collection definitions.
    pub fn as_qdrant(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclid => "Euclid",
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dotproduct" => Ok(Self::Dot),
            "euclid" | "euclidean" => Ok(Self::Euclid),
            other => Err(format!(
                "unknown metric '{other}' (expected cosine, dotproduct, or euclidean)"
            )),
        }
    }
}

/// Shape of the collection recorded by `ensure_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Vector length.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: DistanceMetric,
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Point identifier.
    pub id: String,
    /// Raw Qdrant score. Higher is more similar for cosine and dot product; for
    /// [`DistanceMetric::Euclid`] it is a distance, so lower is closer.
    pub score: f32,
    /// Stored metadata.
    pub metadata: Map<String, Value>,
}

/// Which entries a delete call removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSelector {
    /// Entries with these ids.
    Ids(Vec<String>),
    /// Entries whose metadata matches.
    Filter(MetadataFilter),
    /// Every entry in the namespace.
    All,
}

/// Result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Qdrant accepted the deletion.
    Deleted,
    /// No selector was given; nothing was sent.
    Skipped,
}

/// Entry count and vector dimension of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Entries in the namespace.
    pub count: u64,
    /// Vector dimension of the collection, if reported.
    pub dimension: Option<usize>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct CountResponse {
    pub(crate) result: CountResult,
}

#[derive(Deserialize)]
pub(crate) struct CountResult {
    pub(crate) count: u64,
}

#[derive(Deserialize)]
pub(crate) struct CollectionResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    #[serde(default)]
    pub(crate) vectors: Value,
}

impl CollectionParams {
    /// Size of the unnamed vector, when the collection has one.
    pub(crate) fn vector_size(&self) -> Option<usize> {
        self.vectors
            .get("size")
            .and_then(Value::as_u64)
            .map(|size| size as usize)
    }
}
