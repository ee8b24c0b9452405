//! Qdrant-backed vector index.

pub mod client;
pub mod filters;
pub mod types;

pub use client::QdrantIndex;
pub use filters::{DEFAULT_NAMESPACE, MetadataFilter, NAMESPACE_FIELD};
pub use types::{
    DeleteOutcome, DeleteSelector, DistanceMetric, IndexDescriptor, IndexError, IndexStats, Match,
};
