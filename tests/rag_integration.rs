/// End-to-end tests: ingest documents through the client, then query them
use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use turbochat_rag::config::Config;
use turbochat_rag::error::StorageError;
use turbochat_rag::{
    CreateOutcome, IngestOptions, IngestionStatus, MetadataFilter, QueryRequest, RagClient,
    RagError,
};

async fn offline_client(temp_dir: &TempDir) -> Result<RagClient> {
    let config = Config::offline(temp_dir.path().join("data"));
    Ok(RagClient::with_config(config).await?)
}

fn write(temp_dir: &TempDir, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
    let path = temp_dir.path().join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn three_paragraph_document() -> String {
    format!(
        "{}\n\n{}\n\n{}",
        "Alpha ".repeat(133).trim_end(),
        "Bravo ".repeat(133).trim_end(),
        "Charlie ".repeat(100).trim_end()
    )
}

#[tokio::test]
async fn test_long_document_produces_overlapping_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let text = three_paragraph_document();
    assert!(text.chars().count() >= 2300 && text.chars().count() <= 2400);
    let path = write(&temp_dir, "long.txt", &text)?;

    let report = client.ingest_document(&path, "notes").await;
    assert_eq!(report.status(), IngestionStatus::Indexed);
    assert_eq!(report.chunk_count(), 3);

    let result = client
        .query(QueryRequest::new("bravo", "notes").with_top_k(10))
        .await?;
    assert_eq!(result.sources.len(), 3);
    for source in &result.sources {
        assert!(source.text.chars().count() <= 1000);
    }

    Ok(())
}

#[tokio::test]
async fn test_query_empty_collection_returns_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;

    assert_eq!(
        client.create_collection("empty", Some("nothing yet")).await?,
        CreateOutcome::Created
    );

    let result = client.query(QueryRequest::new("anything", "empty")).await?;
    assert!(result.sources.is_empty());
    assert!(result.contexts.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_top_k_larger_than_collection_returns_all() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let text = format!("{}\n\n{}", "One ".repeat(200).trim_end(), "Two ".repeat(200).trim_end());
    let path = write(&temp_dir, "two.txt", text)?;

    let report = client.ingest_document(&path, "small").await;
    assert_eq!(report.chunk_count(), 2);

    let result = client
        .query(QueryRequest::new("two", "small").with_top_k(5))
        .await?;
    assert_eq!(result.sources.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_corrupt_document_fails_without_changing_counts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let good = write(&temp_dir, "good.txt", "The Krebs cycle occurs in the mitochondrial matrix.")?;
    let corrupt = write(&temp_dir, "broken.docx", b"this is not a zip archive")?;

    client.ingest_document(&good, "biology").await;
    let before = client.list_collections().await?;

    let report = client.ingest_document(&corrupt, "biology").await;
    assert_eq!(report.status(), IngestionStatus::Failed);
    assert!(report.error().is_some());
    assert_eq!(report.chunk_count(), 0);

    let after = client.list_collections().await?;
    assert_eq!(before[0].chunk_count, after[0].chunk_count);
    assert_eq!(before[0].document_count, after[0].document_count);

    Ok(())
}

#[tokio::test]
async fn test_deleted_collection_disappears() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let path = write(&temp_dir, "a.txt", "Some history notes.")?;

    client.ingest_document(&path, "history").await;
    client.ingest_document(&path, "other").await;
    assert!(client.delete_collection("history").await?);

    let names: Vec<String> = client
        .list_collections()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["other"]);

    let err = client
        .query(QueryRequest::new("history", "history"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::Storage(StorageError::CollectionNotFound(_))
    ));

    // The surviving collection is untouched
    let result = client.query(QueryRequest::new("history", "other")).await?;
    assert_eq!(result.sources.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_reingest_is_deterministic() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let path = write(&temp_dir, "long.txt", three_paragraph_document())?;

    let first = client.ingest_document(&path, "first").await;
    let second = client.ingest_document(&path, "second").await;
    assert_eq!(first.chunk_count(), second.chunk_count());

    let query = QueryRequest::new("charlie", "first").with_top_k(10);
    let a = client.query(query.clone()).await?;
    let b = client
        .query(QueryRequest {
            collection_name: "second".to_string(),
            ..query
        })
        .await?;

    assert_eq!(a.contexts, b.contexts);
    let scores_a: Vec<f32> = a.sources.iter().map(|s| s.score).collect();
    let scores_b: Vec<f32> = b.sources.iter().map(|s| s.score).collect();
    assert_eq!(scores_a, scores_b);

    Ok(())
}

#[tokio::test]
async fn test_result_shape_invariants() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let docs = temp_dir.path().join("docs");
    std::fs::create_dir(&docs)?;
    std::fs::write(
        docs.join("biology.md"),
        "# Cells\n\nMitochondria produce ATP.\n\nChloroplasts capture light.",
    )?;
    std::fs::write(
        docs.join("history.html"),
        "<html><head><title>Wars</title></head><body><p>The Treaty of Westphalia was signed in 1648.</p></body></html>",
    )?;
    std::fs::write(
        docs.join("glossary.csv"),
        "term,definition\nosmosis,movement of water across a membrane\nenzyme,biological catalyst\n",
    )?;

    let reports = client
        .ingest_directory(
            &docs,
            "mixed",
            &IngestOptions::default(),
            CancellationToken::new(),
        )
        .await?;
    assert!(reports.iter().all(|r| r.status() == IngestionStatus::Indexed));

    for hybrid in [true, false] {
        let result = client
            .query(
                QueryRequest::new("treaty signed 1648", "mixed")
                    .with_top_k(10)
                    .with_hybrid(hybrid),
            )
            .await?;

        assert_eq!(result.contexts.len(), result.sources.len());
        for (context, source) in result.contexts.iter().zip(&result.sources) {
            assert_eq!(context, &source.text);
            assert!((0.0..=1.0).contains(&source.score));
        }
        for pair in result.sources.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(result.sources[0].text.contains("Westphalia"));
    }

    let filtered = client
        .query(
            QueryRequest::new("membrane", "mixed")
                .with_filter(MetadataFilter::new().eq("filename", "glossary.csv")),
        )
        .await?;
    assert_eq!(filtered.sources.len(), 2);
    assert!(filtered.sources[0].text.contains("osmosis"));

    Ok(())
}

#[tokio::test]
async fn test_overwrite_replaces_document() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let client = offline_client(&temp_dir).await?;
    let path = write(&temp_dir, "draft.txt", "Draft one mentions comets.")?;
    client.ingest_document(&path, "drafts").await;

    std::fs::write(&path, "Draft two mentions asteroids.")?;
    client
        .ingest_document_with(
            &path,
            "drafts",
            &IngestOptions {
                overwrite_existing: true,
            },
            CancellationToken::new(),
        )
        .await;

    let collections = client.list_collections().await?;
    assert_eq!(collections[0].chunk_count, 1);
    assert_eq!(collections[0].document_count, 1);

    let result = client.query(QueryRequest::new("comets", "drafts")).await?;
    assert_eq!(result.contexts, vec!["Draft two mentions asteroids."]);

    Ok(())
}

#[tokio::test]
async fn test_collections_survive_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write(&temp_dir, "a.txt", "Persistent knowledge about glaciers.")?;
    {
        let client = offline_client(&temp_dir).await?;
        client.create_collection("geo", Some("Geography")).await?;
        client.ingest_document(&path, "geo").await;
    }

    let client = offline_client(&temp_dir).await?;
    let collections = client.list_collections().await?;
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].description.as_deref(), Some("Geography"));

    let result = client.query(QueryRequest::new("glaciers", "geo")).await?;
    assert_eq!(result.contexts, vec!["Persistent knowledge about glaciers."]);
    assert!(result.format_context().contains("---DOCUMENT 1---"));
    assert!(result.format_sources().starts_with("Source 1 [a.txt]:"));

    Ok(())
}
