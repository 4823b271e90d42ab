//! Ingestion pipeline: loader -> chunker -> embedding -> store
//!
//! Nothing is written to the store until every chunk of the document has been
//! embedded, so a failed or cancelled ingestion leaves the collection as it was.

use crate::embedding::EmbeddingProvider;
use crate::error::{ChunkingError, DocumentError, EmbeddingError, IndexingError, RagError};
use crate::indexer::{DocumentChunk, TextChunker, chunk_document, load_document};
use crate::retrieval::RetrievalCache;
use crate::types::{Chunk, IngestOptions, IngestionReport, metadata_keys};
use crate::vector_db::catalog::timestamp_now;
use crate::vector_db::{CollectionStore, validate_collection_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Return early with `IndexingError::Cancelled` if the token fired
macro_rules! check_cancelled {
    ($cancel_token:expr) => {
        if $cancel_token.is_cancelled() {
            tracing::info!("Ingestion cancelled");
            return Err(IndexingError::Cancelled.into());
        }
    };
}

/// Drives documents from disk into a collection
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn CollectionStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<RetrievalCache>,
    chunker: TextChunker,
    batch_size: usize,
    timeout_secs: u64,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<RetrievalCache>,
        chunker: TextChunker,
        batch_size: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            embedding_provider,
            cache,
            chunker,
            batch_size: batch_size.max(1),
            timeout_secs,
        }
    }

    /// Ingest one document; failures are recorded in the returned report
    pub async fn ingest(
        &self,
        path: &Path,
        collection: &str,
        options: &IngestOptions,
        cancel_token: &CancellationToken,
    ) -> IngestionReport {
        let document_id = uuid::Uuid::new_v4().to_string();
        let filename = display_filename(path);
        let mut report = IngestionReport::new(&document_id, &filename, collection);

        if let Err(e) = validate_collection_name(collection) {
            tracing::error!("Cannot ingest {} into '{}': {}", filename, collection, e);
            report.fail(RagError::from(e));
            return report;
        }

        report.begin();
        let start = Instant::now();

        match self
            .run(path, collection, &document_id, options, cancel_token)
            .await
        {
            Ok(chunk_count) => {
                tracing::info!(
                    "Ingested {} into '{}': {} chunks in {:?}",
                    filename,
                    collection,
                    chunk_count,
                    start.elapsed()
                );
                report.complete(chunk_count);
            }
            Err(e) => {
                tracing::error!("Failed to ingest {} into '{}': {}", filename, collection, e);
                report.fail(e);
            }
        }

        report
    }

    /// Ingest documents one after another, continuing past failures
    pub async fn ingest_all(
        &self,
        paths: &[PathBuf],
        collection: &str,
        options: &IngestOptions,
        cancel_token: &CancellationToken,
    ) -> Vec<IngestionReport> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.ingest(path, collection, options, cancel_token).await);
        }

        let failed = reports.iter().filter(|r| r.error().is_some()).count();
        tracing::info!(
            "Batch ingestion into '{}' finished: {} documents, {} failed",
            collection,
            reports.len(),
            failed
        );
        reports
    }

    /// Ingest every regular file under `dir`, in path order
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        collection: &str,
        options: &IngestOptions,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<IngestionReport>, RagError> {
        let files = collect_files(dir).await?;
        tracing::info!("Found {} files under {}", files.len(), dir.display());
        Ok(self.ingest_all(&files, collection, options, cancel_token).await)
    }

    async fn run(
        &self,
        path: &Path,
        collection: &str,
        document_id: &str,
        options: &IngestOptions,
        cancel_token: &CancellationToken,
    ) -> Result<usize, RagError> {
        check_cancelled!(cancel_token);

        let source = std::fs::canonicalize(path)
            .map_err(|_| DocumentError::NotFound(path.display().to_string()))?;
        let source_str = source.to_string_lossy().to_string();

        // Load and chunk on a blocking thread (PDF extraction is CPU-bound)
        let chunker = self.chunker.clone();
        let load_path = source.clone();
        let document_chunks = tokio::task::spawn_blocking(move || {
            let document = load_document(&load_path)?;
            tracing::debug!(
                "Loaded {} ({}, {} chars)",
                load_path.display(),
                document.format,
                document.char_count()
            );
            Ok::<_, RagError>(chunk_document(&document, &chunker))
        })
        .await
        .map_err(|e| load_task_error(&source_str, e))??;

        if document_chunks.is_empty() {
            return Err(ChunkingError::NoChunksGenerated(source_str).into());
        }

        check_cancelled!(cancel_token);

        let texts: Vec<String> = document_chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed_with_cancellation(texts, cancel_token).await?;

        check_cancelled!(cancel_token);

        let filename = display_filename(&source);
        let created_at = timestamp_now();
        let chunks: Vec<Chunk> = document_chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                build_chunk(chunk, vector, &source_str, &filename, &created_at, document_id)
            })
            .collect();

        let written = if options.overwrite_existing {
            self.store
                .replace_source(collection, &source_str, chunks)
                .await?
        } else {
            self.store.add(collection, chunks).await?
        };

        self.cache.invalidate(collection);
        Ok(written)
    }

    /// Embed texts in batches, checking for cancellation between batches
    async fn embed_with_cancellation(
        &self,
        texts: Vec<String>,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let expected_dim = self.store.dimension();
        let total_batches = texts.len().div_ceil(self.batch_size);
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            if cancel_token.is_cancelled() {
                tracing::info!(
                    "Embedding cancelled after {} of {} batches",
                    batch_idx,
                    total_batches
                );
                return Err(IndexingError::Cancelled.into());
            }

            let provider = self.embedding_provider.clone();
            let batch_texts = batch.to_vec();
            let embed_future = tokio::task::spawn_blocking(move || provider.embed_batch(batch_texts));

            let vectors = match tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                embed_future,
            )
            .await
            {
                Ok(Ok(Ok(vectors))) => vectors,
                Ok(Ok(Err(e))) => {
                    return Err(EmbeddingError::GenerationFailed(format!("{:#}", e)).into());
                }
                Ok(Err(e)) => {
                    return Err(
                        IndexingError::TaskFailed(format!("embedding task panicked: {}", e)).into(),
                    );
                }
                Err(_) => return Err(EmbeddingError::Timeout(self.timeout_secs).into()),
            };

            if vectors.len() != batch.len() {
                return Err(EmbeddingError::GenerationFailed(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))
                .into());
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dim) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: expected_dim,
                    actual: bad.len(),
                }
                .into());
            }

            embeddings.extend(vectors);
            tracing::debug!(
                "Embedded batch {}/{} ({} chunks)",
                batch_idx + 1,
                total_batches,
                embeddings.len()
            );
        }

        Ok(embeddings)
    }
}

fn build_chunk(
    chunk: DocumentChunk,
    vector: Vec<f32>,
    source: &str,
    filename: &str,
    created_at: &str,
    document_id: &str,
) -> Chunk {
    let mut metadata = chunk.metadata;
    metadata.insert(metadata_keys::SOURCE.to_string(), source.into());
    metadata.insert(metadata_keys::FILENAME.to_string(), filename.into());
    metadata.insert(metadata_keys::CREATED_AT.to_string(), created_at.into());
    metadata.insert(metadata_keys::DOCUMENT_ID.to_string(), document_id.into());
    Chunk::new(
        uuid::Uuid::new_v4().to_string(),
        chunk.content,
        vector,
        metadata,
    )
}

fn display_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular files under `dir`, sorted by path
async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, RagError> {
    if !dir.is_dir() {
        return Err(IndexingError::DirectoryNotFound(dir.display().to_string()).into());
    }

    let root = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| IndexingError::WalkFailed(e.to_string()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok::<_, RagError>(files)
    })
    .await
    .map_err(|e| IndexingError::TaskFailed(format!("directory walk panicked: {}", e)))?
}

/// A panicking extractor means the file could not be parsed
fn load_task_error(source: &str, err: tokio::task::JoinError) -> RagError {
    if err.is_panic() {
        DocumentError::UnsupportedOrCorrupt {
            path: source.to_string(),
            reason: format!("extractor panicked: {}", err),
        }
        .into()
    } else {
        IndexingError::TaskFailed(format!("document loading failed: {}", err)).into()
    }
}
