//! Document processing pipeline: metadata assembly, ingestion, search, and batch runs.

pub mod batch;
pub mod metadata;
mod service;
pub mod types;

pub use batch::discover_documents;
pub use metadata::{FilenameTags, chunk_id, classify_filename};
pub use service::IngestionService;
pub use types::{BatchSummary, IngestOutcome, KnowledgeBaseStats, ProcessingError, SearchHit};
