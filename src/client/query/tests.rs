use super::*;
use crate::embedding::HashingEmbedder;
use crate::types::{Chunk, Metadata, MetadataFilter, metadata_keys};
use crate::vector_db::LanceCollectionStore;
use serde_json::json;
use tempfile::TempDir;

const DIM: usize = 64;

struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn embed_batch(&self, _texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("no model loaded")
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "broken"
    }
}

async fn setup() -> (QueryService, Arc<LanceCollectionStore>, Arc<RetrievalCache>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(LanceCollectionStore::open(temp_dir.path(), DIM).await.unwrap());
    let cache = Arc::new(RetrievalCache::new(4));
    let service = QueryService::new(
        store.clone(),
        Arc::new(HashingEmbedder::new(DIM)),
        cache.clone(),
        HybridRetriever::default(),
    );
    (service, store, cache, temp_dir)
}

fn embedded_chunk(text: &str, filename: &str) -> Chunk {
    let vector = HashingEmbedder::new(DIM).embed(text).unwrap();
    let mut metadata = Metadata::new();
    metadata.insert(metadata_keys::SOURCE.to_string(), json!(format!("/docs/{}", filename)));
    metadata.insert(metadata_keys::FILENAME.to_string(), json!(filename));
    Chunk::new(uuid::Uuid::new_v4().to_string(), text, vector, metadata)
}

async fn seed(store: &LanceCollectionStore) {
    store
        .add(
            "science",
            vec![
                embedded_chunk("Photosynthesis converts light into chemical energy.", "bio.txt"),
                embedded_chunk("The mitochondria produce ATP through respiration.", "bio.txt"),
                embedded_chunk("Newton's laws describe motion and force.", "physics.txt"),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_query_missing_collection() {
    let (service, _store, _cache, _temp_dir) = setup().await;

    let err = service
        .query(QueryRequest::new("anything", "ghost"))
        .await
        .unwrap_err();
    assert!(err.is_collection_not_found());
}

#[tokio::test]
async fn test_query_empty_collection() {
    let (service, store, _cache, _temp_dir) = setup().await;
    store.create("empty", None).await.unwrap();

    let result = service
        .query(QueryRequest::new("anything", "empty"))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert!(result.contexts.is_empty());
    assert_eq!(result.query, "anything");
}

#[tokio::test]
async fn test_query_ranks_relevant_chunk_first() {
    let (service, store, _cache, _temp_dir) = setup().await;
    seed(&store).await;

    let result = service
        .query(QueryRequest::new("photosynthesis light energy", "science"))
        .await
        .unwrap();

    assert_eq!(result.sources.len(), 3);
    assert_eq!(
        result.sources[0].text,
        "Photosynthesis converts light into chemical energy."
    );
    assert_eq!(result.contexts.len(), result.sources.len());
    for (context, source) in result.contexts.iter().zip(&result.sources) {
        assert_eq!(context, &source.text);
    }
    for pair in result.sources.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_top_k_larger_than_collection() {
    let (service, store, _cache, _temp_dir) = setup().await;
    store
        .add(
            "small",
            vec![
                embedded_chunk("first chunk", "a.txt"),
                embedded_chunk("second chunk", "a.txt"),
            ],
        )
        .await
        .unwrap();

    let result = service
        .query(QueryRequest::new("chunk", "small").with_top_k(5))
        .await
        .unwrap();
    assert_eq!(result.sources.len(), 2);
}

#[tokio::test]
async fn test_filter_and_vector_only_mode() {
    let (service, store, _cache, _temp_dir) = setup().await;
    seed(&store).await;

    let request = QueryRequest::new("energy", "science")
        .with_hybrid(false)
        .with_filter(MetadataFilter::new().eq("filename", "physics.txt"));
    let result = service.query(request).await.unwrap();

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].metadata["filename"], "physics.txt");
    assert!(result.sources[0].lexical_score.is_none());
}

#[tokio::test]
async fn test_materialize_reuses_cache_until_write() {
    let (service, store, cache, _temp_dir) = setup().await;
    seed(&store).await;

    let first = service.materialize("science").await.unwrap();
    let second = service.materialize("science").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    store
        .add("science", vec![embedded_chunk("Entropy always increases.", "physics.txt")])
        .await
        .unwrap();

    let third = service.materialize("science").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), 4);
    assert!(third.generation > first.generation);
}

#[tokio::test]
async fn test_query_after_delete() {
    let (service, store, _cache, _temp_dir) = setup().await;
    seed(&store).await;
    service.materialize("science").await.unwrap();

    store.delete("science").await.unwrap();

    let err = service
        .query(QueryRequest::new("energy", "science"))
        .await
        .unwrap_err();
    assert!(err.is_collection_not_found());
}

#[tokio::test]
async fn test_query_embedding_failure() {
    let (_service, store, cache, _temp_dir) = setup().await;
    seed(&store).await;
    let service = QueryService::new(
        store.clone(),
        Arc::new(BrokenEmbedder),
        cache,
        HybridRetriever::default(),
    );

    let err = service
        .query(QueryRequest::new("energy", "science"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingError::GenerationFailed(_))
    ));
}
