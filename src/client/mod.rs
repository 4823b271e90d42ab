//! Core library client for turbochat-rag
//!
//! This module provides the main client interface for using turbochat-rag
//! as a library in your own Rust applications.

pub mod ingestion;
pub mod query;

pub use ingestion::IngestionPipeline;
pub use query::QueryService;

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, build_provider};
use crate::error::RagError;
use crate::indexer::TextChunker;
use crate::retrieval::{FusionPolicy, HybridRetriever, RetrievalCache};
use crate::types::*;
use crate::vector_db::{CollectionStore, LanceCollectionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main client for interacting with the RAG engine
///
/// Owns the collection store, the embedding provider and the retrieval cache,
/// and exposes collection management, document ingestion and querying.
///
/// # Example
///
/// ```no_run
/// use turbochat_rag::{QueryRequest, RagClient};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RagClient::new().await?;
///
///     let report = client.ingest_document("notes/cells.pdf", "biology").await;
///     println!("{}: {}", report.filename(), report.status());
///
///     let result = client
///         .query(QueryRequest::new("What do mitochondria do?", "biology"))
///         .await?;
///     println!("{}", result.format_sources());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RagClient {
    pub(crate) config: Arc<Config>,
    pub(crate) store: Arc<dyn CollectionStore>,
    pub(crate) embedding_provider: Arc<dyn EmbeddingProvider>,
    pub(crate) cache: Arc<RetrievalCache>,
    pub(crate) ingestion: IngestionPipeline,
    pub(crate) queries: QueryService,
}

impl RagClient {
    /// Create a new client from the default config file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded or is invalid
    /// - Embedding model cannot be initialized
    /// - The collection store cannot be opened
    pub async fn new() -> Result<Self, RagError> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a new client with custom configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use turbochat_rag::{Config, RagClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut config = Config::default();
    ///     config.embedding.model_name = "BAAI/bge-small-en-v1.5".to_string();
    ///
    ///     let client = RagClient::with_config(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn with_config(config: Config) -> Result<Self, RagError> {
        config.validate()?;
        tracing::info!("Initializing RAG client with configuration");
        tracing::debug!("Embedding provider: {:?}", config.embedding.provider);
        tracing::debug!("Embedding model: {}", config.embedding.model_name);

        let embedding_config = config.embedding.clone();
        let embedding_provider = tokio::task::spawn_blocking(move || build_provider(&embedding_config))
            .await
            .map_err(|e| RagError::other(format!("Embedding initialization panicked: {}", e)))??;

        Self::with_embedder(config, embedding_provider).await
    }

    /// Create a client around an already constructed embedding provider
    pub async fn with_embedder(
        config: Config,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        config.validate()?;

        tracing::info!(
            "Opening collection store at {} (dimension {})",
            config.storage.data_dir.display(),
            embedding_provider.dimension()
        );
        let store: Arc<dyn CollectionStore> = Arc::new(
            LanceCollectionStore::open(&config.storage.data_dir, embedding_provider.dimension())
                .await?,
        );

        let cache = Arc::new(RetrievalCache::new(config.retrieval.max_cached_collections));
        let chunker = TextChunker::new(config.chunking.max_size, config.chunking.overlap)?;

        let ingestion = IngestionPipeline::new(
            store.clone(),
            embedding_provider.clone(),
            cache.clone(),
            chunker,
            config.embedding.batch_size,
            config.embedding.timeout_secs,
        );
        let queries = QueryService::new(
            store.clone(),
            embedding_provider.clone(),
            cache.clone(),
            HybridRetriever::new(FusionPolicy::from(&config.retrieval)),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            embedding_provider,
            cache,
            ingestion,
            queries,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedding_dimension(&self) -> usize {
        self.embedding_provider.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.embedding_provider.model_name()
    }

    /// Create an empty collection
    pub async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreateOutcome, RagError> {
        self.store.create(name, description).await
    }

    /// Delete a collection and everything in it; `false` if it did not exist
    pub async fn delete_collection(&self, name: &str) -> Result<bool, RagError> {
        let deleted = self.store.delete(name).await?;
        self.cache.invalidate(name);
        Ok(deleted)
    }

    /// All collections with their document and chunk counts, sorted by name
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, RagError> {
        self.store.list().await
    }

    /// Ingest one document, creating the collection if needed
    ///
    /// Failures are reported through the returned report's status and error.
    pub async fn ingest_document(
        &self,
        path: impl AsRef<Path>,
        collection: &str,
    ) -> IngestionReport {
        self.ingest_document_with(
            path,
            collection,
            &IngestOptions::default(),
            CancellationToken::new(),
        )
        .await
    }

    /// Ingest one document with explicit options and a cancellation token
    pub async fn ingest_document_with(
        &self,
        path: impl AsRef<Path>,
        collection: &str,
        options: &IngestOptions,
        cancel_token: CancellationToken,
    ) -> IngestionReport {
        self.ingestion
            .ingest(path.as_ref(), collection, options, &cancel_token)
            .await
    }

    /// Ingest several documents in order; one failure does not stop the rest
    pub async fn ingest_documents<I, P>(
        &self,
        paths: I,
        collection: &str,
        options: &IngestOptions,
        cancel_token: CancellationToken,
    ) -> Vec<IngestionReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        self.ingestion
            .ingest_all(&paths, collection, options, &cancel_token)
            .await
    }

    /// Ingest every file under a directory (recursively, in path order)
    pub async fn ingest_directory(
        &self,
        dir: impl AsRef<Path>,
        collection: &str,
        options: &IngestOptions,
        cancel_token: CancellationToken,
    ) -> Result<Vec<IngestionReport>, RagError> {
        self.ingestion
            .ingest_directory(dir.as_ref(), collection, options, &cancel_token)
            .await
    }

    /// Remove every chunk ingested from `source`; returns the number removed
    ///
    /// `source` may be the stored path or any path that resolves to it.
    pub async fn delete_document(&self, collection: &str, source: &str) -> Result<usize, RagError> {
        let source = Self::normalize_source(source);
        let removed = self.store.delete_source(collection, &source).await?;
        self.cache.invalidate(collection);
        tracing::info!("Removed {} chunks of {} from '{}'", removed, source, collection);
        Ok(removed)
    }

    /// A query request carrying the configured `top_k` and hybrid defaults
    pub fn request(
        &self,
        query: impl Into<String>,
        collection: impl Into<String>,
    ) -> QueryRequest {
        let defaults = &self.config.retrieval;
        QueryRequest::new(query, collection)
            .with_top_k(defaults.top_k)
            .with_hybrid(defaults.hybrid)
    }

    /// Query a collection with hybrid (or vector-only) retrieval
    ///
    /// # Example
    ///
    /// ```no_run
    /// use turbochat_rag::{QueryRequest, RagClient};
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = RagClient::new().await?;
    ///
    /// let request = QueryRequest::new("treaty of westphalia", "history").with_top_k(3);
    /// let result = client.query(request).await?;
    /// for source in &result.sources {
    ///     println!("{:.2} {}", source.score, source.text);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query(&self, request: QueryRequest) -> Result<RetrievalResult, RagError> {
        self.queries.query(request).await
    }

    /// Canonical form of a source path, or the input unchanged if it does not resolve
    pub fn normalize_source(source: &str) -> String {
        std::fs::canonicalize(source)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| source.to_string())
    }
}
