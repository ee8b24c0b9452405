//! HTTP client wrapper for the Qdrant collection backing the index.
//!
//! One collection holds every namespace; the namespace is a keyword payload field written on
//! upsert and filtered on every read or delete. The empty namespace is stored under
//! [`DEFAULT_NAMESPACE`](super::filters::DEFAULT_NAMESPACE). Calls are not retried here: a
//! failed request surfaces to the caller as-is.

use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};
use std::sync::OnceLock;

use super::filters::{MetadataFilter, NAMESPACE_FIELD, namespace_value, scoped_filter};
use super::types::{
    CollectionResponse, CountResponse, DeleteOutcome, DeleteSelector, DistanceMetric,
    IndexDescriptor, IndexError, IndexStats, Match, QueryResponse, QueryResponseResult,
};
use crate::config::IndexConfig;
use crate::http::{build_client, format_endpoint, normalize_base_url};

/// Payload fields indexed as keywords so filters stay fast.
const KEYWORD_FIELDS: [&str; 2] = ["source", NAMESPACE_FIELD];

/// Lightweight HTTP client for one Qdrant collection.
#[derive(Debug)]
pub struct QdrantIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) descriptor: OnceLock<IndexDescriptor>,
}

impl QdrantIndex {
    /// Construct a client for the configured collection.
    pub fn from_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let client = build_client(None)?;
        let base_url = normalize_base_url(&config.url).map_err(IndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.collection,
            has_api_key = config
                .api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            descriptor: OnceLock::new(),
        })
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection when it is missing, then ensure keyword payload indexes.
    ///
    /// Idempotent: an existing collection is left untouched. Returns `true` when the
    /// collection was created by this call. An existing collection with another vector size is
    /// rejected with [`IndexError::DimensionMismatch`] and the index stays uninitialized.
    pub async fn ensure_index(
        &self,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<bool, IndexError> {
        let created = match self.describe_collection().await? {
            Some(existing) => {
                if let Some(existing) = existing
                    && existing != dimension
                {
                    tracing::error!(
                        collection = %self.collection,
                        existing,
                        requested = dimension,
                        "Existing collection has a different vector size"
                    );
                    return Err(IndexError::DimensionMismatch {
                        collection: self.collection.clone(),
                        existing,
                        requested: dimension,
                    });
                }
                false
            }
            None => {
                self.create_collection(dimension, metric).await?;
                true
            }
        };

        self.ensure_payload_indexes().await?;
        let _ = self.descriptor.set(IndexDescriptor { dimension, metric });
        tracing::info!(
            collection = %self.collection,
            dimension,
            metric = metric.as_qdrant(),
            created,
            "Index ready"
        );
        Ok(created)
    }

    /// Upsert entries in sequential batches of `batch_size`, returning the acknowledged total.
    ///
    /// Batches are not retried. When a batch fails, the batches before it remain written and
    /// the error is [`IndexError::PartialUpsert`] carrying how many entries were acknowledged.
    pub async fn upsert_batch(
        &self,
        vectors: &[Vec<f32>],
        ids: &[String],
        metadata: &[Map<String, Value>],
        batch_size: usize,
        namespace: &str,
    ) -> Result<usize, IndexError> {
        self.require_initialized()?;
        if vectors.len() != ids.len() || ids.len() != metadata.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                ids: ids.len(),
                metadata: metadata.len(),
            });
        }

        let batch_size = batch_size.max(1);
        let batches = ids.len().div_ceil(batch_size);
        let mut upserted = 0;
        for (batch, start) in (0..ids.len()).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(ids.len());
            let points: Vec<Value> = (start..end)
                .map(|idx| {
                    json!({
                        "id": ids[idx],
                        "vector": vectors[idx],
                        "payload": with_namespace(&metadata[idx], namespace),
                    })
                })
                .collect();

            match self.put_points(points).await {
                Ok(acknowledged) => {
                    upserted += acknowledged;
                    tracing::debug!(
                        collection = %self.collection,
                        batch = batch + 1,
                        batches,
                        acknowledged,
                        "Upserted batch"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        collection = %self.collection,
                        batch = batch + 1,
                        batches,
                        upserted,
                        error = %error,
                        "Upsert batch failed; earlier batches remain written"
                    );
                    return Err(IndexError::PartialUpsert {
                        upserted,
                        source: Box::new(error),
                    });
                }
            }
        }
        Ok(upserted)
    }

    /// Nearest neighbours of `vector` in `namespace`, best first.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        namespace: &str,
    ) -> Result<Vec<Match>, IndexError> {
        self.require_initialized()?;
        let must = filter.map(MetadataFilter::must_conditions).unwrap_or_default();
        let body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
            "filter": scoped_filter(namespace, must),
        });

        let response = self
            .request(Method::POST, &self.collection_path("points/query"))
            .json(&body)
            .send()
            .await?;
        let response = self.ensure_success(response, "query").await?;

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let matches: Vec<Match> = points
            .into_iter()
            .map(|point| Match {
                id: stringify_point_id(point.id),
                score: point.score,
                metadata: point.payload.unwrap_or_default(),
            })
            .collect();
        tracing::debug!(
            collection = %self.collection,
            namespace,
            top_k,
            matches = matches.len(),
            "Query completed"
        );
        Ok(matches)
    }

    /// Delete entries chosen by `selector` within `namespace`.
    ///
    /// `None` is a no-op reported as [`DeleteOutcome::Skipped`]. Empty id lists and empty
    /// filters are rejected because they would otherwise match the whole namespace.
    pub async fn delete(
        &self,
        selector: Option<DeleteSelector>,
        namespace: &str,
    ) -> Result<DeleteOutcome, IndexError> {
        self.require_initialized()?;
        let Some(selector) = selector else {
            tracing::warn!(collection = %self.collection, namespace, "Delete called without a selector; nothing removed");
            return Ok(DeleteOutcome::Skipped);
        };

        let must = match &selector {
            DeleteSelector::Ids(ids) if ids.is_empty() => {
                return Err(IndexError::InvalidDeletionRequest("empty id list".into()));
            }
            DeleteSelector::Ids(ids) => vec![json!({ "has_id": ids })],
            DeleteSelector::Filter(filter) if filter.is_empty() => {
                return Err(IndexError::InvalidDeletionRequest("empty filter".into()));
            }
            DeleteSelector::Filter(filter) => filter.must_conditions(),
            DeleteSelector::All => Vec::new(),
        };

        let response = self
            .request(Method::POST, &self.collection_path("points/delete"))
            .query(&[("wait", true)])
            .json(&json!({ "filter": scoped_filter(namespace, must) }))
            .send()
            .await?;
        self.ensure_success(response, "delete").await?;
        tracing::info!(collection = %self.collection, namespace, selector = ?selector, "Deleted entries");
        Ok(DeleteOutcome::Deleted)
    }

    /// Entry count of `namespace` and the collection's vector dimension.
    pub async fn stats(&self, namespace: &str) -> Result<IndexStats, IndexError> {
        self.require_initialized()?;
        let response = self
            .request(Method::POST, &self.collection_path("points/count"))
            .json(&json!({ "filter": scoped_filter(namespace, Vec::new()), "exact": true }))
            .send()
            .await?;
        let response = self.ensure_success(response, "count").await?;
        let CountResponse { result } = response.json().await?;

        let dimension = self.describe_collection().await?.flatten();
        Ok(IndexStats {
            count: result.count,
            dimension,
        })
    }

    /// `None` when the collection is absent, otherwise its unnamed vector size (if any).
    async fn describe_collection(&self) -> Result<Option<Option<usize>>, IndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let payload: CollectionResponse = response.json().await?;
                Ok(Some(payload.result.config.params.vector_size()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => {
                self.ensure_success(response, "describe collection").await?;
                Err(IndexError::InvalidResponse("unexpected collection status".into()))
            }
        }
    }

    async fn create_collection(
        &self,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError> {
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": metric.as_qdrant(),
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;
        self.ensure_success(response, "create collection").await?;
        tracing::info!(collection = %self.collection, dimension, "Collection created");
        Ok(())
    }

    async fn ensure_payload_indexes(&self) -> Result<(), IndexError> {
        for field in KEYWORD_FIELDS {
            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });
            let response = self
                .request(Method::PUT, &self.collection_path("index"))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, "Payload index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(collection = %self.collection, field, %status, body = %body, "Failed to ensure payload index");
            }
        }
        Ok(())
    }

    async fn put_points(&self, points: Vec<Value>) -> Result<usize, IndexError> {
        let count = points.len();
        let response = self
            .request(Method::PUT, &self.collection_path("points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;
        self.ensure_success(response, "upsert").await?;
        Ok(count)
    }

    fn require_initialized(&self) -> Result<IndexDescriptor, IndexError> {
        self.descriptor
            .get()
            .copied()
            .ok_or_else(|| IndexError::NotInitialized(self.collection.clone()))
    }

    fn collection_path(&self, suffix: &str) -> String {
        format!("collections/{}/{suffix}", self.collection)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, IndexError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = IndexError::OperationFailure { status, body };
        tracing::error!(collection = %self.collection, operation, error = %error, "Qdrant request failed");
        Err(error)
    }
}

fn with_namespace(metadata: &Map<String, Value>, namespace: &str) -> Value {
    let mut payload = metadata.clone();
    payload.insert(NAMESPACE_FIELD.into(), Value::from(namespace_value(namespace)));
    Value::Object(payload)
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
