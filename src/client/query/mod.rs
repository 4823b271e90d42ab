//! Query service: snapshot materialization, query embedding and retrieval

use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexingError, RagError};
use crate::retrieval::{HybridRetriever, IndexedCollection, RetrievalCache, RetrievalParams};
use crate::types::{QueryRequest, RetrievalResult};
use crate::vector_db::CollectionStore;
use std::sync::Arc;
use std::time::Instant;

/// Answers queries against one collection at a time
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn CollectionStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<RetrievalCache>,
    retriever: HybridRetriever,
}

impl QueryService {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<RetrievalCache>,
        retriever: HybridRetriever,
    ) -> Self {
        Self {
            store,
            embedding_provider,
            cache,
            retriever,
        }
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Rank the chunks of `request.collection_name` against `request.query`
    pub async fn query(&self, request: QueryRequest) -> Result<RetrievalResult, RagError> {
        let start = Instant::now();

        let collection = self.materialize(&request.collection_name).await?;
        if collection.is_empty() || request.top_k == 0 {
            return Ok(RetrievalResult::from_sources(
                request.query,
                Vec::new(),
                start.elapsed(),
            ));
        }

        let query_vector = self.embed_query(&request.query).await?;

        let retriever = self.retriever.clone();
        let QueryRequest {
            query,
            top_k,
            hybrid,
            filter,
            ..
        } = request;

        let (query, sources) = tokio::task::spawn_blocking(move || {
            let sources = retriever.retrieve(
                &collection,
                RetrievalParams {
                    query_text: &query,
                    query_vector: &query_vector,
                    top_k,
                    hybrid,
                    filter: filter.as_ref(),
                },
            );
            (query, sources)
        })
        .await
        .map_err(|e| IndexingError::TaskFailed(format!("retrieval task panicked: {}", e)))?;
        let sources = sources?;

        let elapsed = start.elapsed();
        tracing::info!(
            "Query returned {} sources in {:?} (hybrid: {})",
            sources.len(),
            elapsed,
            hybrid
        );

        Ok(RetrievalResult::from_sources(query, sources, elapsed))
    }

    /// Indexed view of a collection at its current generation
    ///
    /// Reuses the cached lexical index when no write happened since it was built.
    pub async fn materialize(&self, name: &str) -> Result<Arc<IndexedCollection>, RagError> {
        let generation = self.store.generation(name).await;
        if let Some(cached) = self.cache.get(name, generation) {
            tracing::debug!("Retrieval cache hit for '{}' at generation {}", name, generation);
            return Ok(cached);
        }

        let snapshot = self.store.snapshot(name).await?;
        let chunk_count = snapshot.chunks.len();
        let build_start = Instant::now();

        let indexed = tokio::task::spawn_blocking(move || IndexedCollection::build(snapshot))
            .await
            .map_err(|e| IndexingError::TaskFailed(format!("index build panicked: {}", e)))??;
        let indexed = Arc::new(indexed);

        tracing::debug!(
            "Built lexical index for '{}' ({} chunks) in {:?}",
            name,
            chunk_count,
            build_start.elapsed()
        );

        self.cache.insert(indexed.clone());
        Ok(indexed)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RagError> {
        let provider = self.embedding_provider.clone();
        let text = query.to_string();
        tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| IndexingError::TaskFailed(format!("embedding task panicked: {}", e)))?
            .map_err(|e| EmbeddingError::GenerationFailed(format!("{:#}", e)).into())
    }
}

#[cfg(test)]
mod tests;
