//! # TurboChat RAG - Document Ingestion and Hybrid Retrieval
//!
//! A retrieval-augmented generation engine for documents: PDFs, plain text,
//! Markdown, HTML, CSV and DOCX files are loaded, split into overlapping
//! chunks, embedded and stored in named collections. Queries combine BM25
//! keyword ranking with vector similarity and return ranked, attributed
//! passages ready for a model prompt.
//!
//! ## Key Features
//!
//! - **Local Embeddings**: FastEmbed (all-MiniLM-L6-v2 by default), or a
//!   deterministic hashing embedder for offline use
//! - **Hybrid Search**: normalized BM25 (Tantivy) and cosine scores fused with
//!   configurable weights
//! - **Collections**: independent, durable partitions stored as LanceDB tables
//! - **Transactional Ingestion**: a document becomes visible all at once or not at all
//!
//! ## Architecture
//!
//! ```text
//! file -> loader -> chunker -> embedding provider -> collection store (LanceDB)
//!
//! query -> query service -> snapshot (+ cached Tantivy index) -> hybrid retriever
//!       -> RetrievalResult { contexts, sources }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: The [`RagClient`] facade, ingestion pipeline and query service
//! - [`indexer`]: Document loaders and the text chunker
//! - [`embedding`]: Embedding providers (FastEmbed, hashing)
//! - [`vector_db`]: Durable collection store backed by LanceDB
//! - [`bm25_search`]: BM25 keyword scoring using Tantivy
//! - [`retrieval`]: Score normalization, fusion and the retrieval cache
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Chunks, collections, reports and query types
//! - [`error`]: Error types
//! - [`paths`]: Platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use turbochat_rag::{QueryRequest, RagClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RagClient::new().await?;
//!
//!     client.ingest_document("papers/photosynthesis.pdf", "biology").await;
//!
//!     let result = client
//!         .query(QueryRequest::new("Where does photosynthesis happen?", "biology"))
//!         .await?;
//!     println!("{}", result.format_context());
//!
//!     Ok(())
//! }
//! ```

/// BM25 keyword search using Tantivy for hybrid search
pub mod bm25_search;

/// Library client: collection management, ingestion and querying
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed or feature hashing
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Document loading and text chunking
pub mod indexer;

/// Platform-specific data and config locations
pub mod paths;

/// Hybrid score fusion and the per-collection retrieval cache
pub mod retrieval;

/// Domain types shared by every component
pub mod types;

/// Durable collection store backed by LanceDB
pub mod vector_db;

pub use client::RagClient;
pub use config::Config;
pub use error::RagError;
pub use types::{
    Chunk, CollectionInfo, CreateOutcome, IngestOptions, IngestionReport, IngestionStatus,
    MetadataFilter, QueryRequest, RetrievalResult, Source,
};
