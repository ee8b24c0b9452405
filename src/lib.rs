#![deny(missing_docs)]

//! Document ingestion and semantic retrieval backed by Ollama embeddings and Qdrant.

/// Chunking strategies.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Format-aware text extraction.
pub mod extraction;
/// Chat completions against the generation service.
pub mod generation;
/// Shared HTTP client helpers.
pub mod http;
/// Structured logging and tracing setup.
pub mod logging;
/// Document processing pipeline.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Bounded retry for outbound HTTP calls.
pub mod retry;
