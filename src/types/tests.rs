use super::*;
use serde_json::json;

fn metadata(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_query_request_defaults_from_json() {
    let req: QueryRequest =
        serde_json::from_str(r#"{"query": "photosynthesis", "collection_name": "biology"}"#)
            .unwrap();

    assert_eq!(req.top_k, 5);
    assert!(req.hybrid);
    assert!(req.filter.is_none());
}

#[test]
fn test_query_request_builder() {
    let req = QueryRequest::new("q", "c")
        .with_top_k(2)
        .with_hybrid(false)
        .with_filter(MetadataFilter::new().eq("filename", "a.txt"));

    assert_eq!(req.top_k, 2);
    assert!(!req.hybrid);
    assert!(req.filter.is_some());
}

#[test]
fn test_metadata_filter_matches_all_conditions() {
    let meta = metadata(&[
        ("filename", json!("chapter1.pdf")),
        ("position", json!(3)),
    ]);

    assert!(MetadataFilter::new().matches(&meta));
    assert!(MetadataFilter::new().eq("filename", "chapter1.pdf").matches(&meta));
    assert!(
        MetadataFilter::new()
            .eq("filename", "chapter1.pdf")
            .eq("position", 3)
            .matches(&meta)
    );
    assert!(
        !MetadataFilter::new()
            .eq("filename", "chapter1.pdf")
            .eq("position", 4)
            .matches(&meta)
    );
    assert!(!MetadataFilter::new().eq("missing", "x").matches(&meta));
}

#[test]
fn test_metadata_filter_deserializes_from_plain_object() {
    let filter: MetadataFilter = serde_json::from_str(r#"{"filename": "notes.md"}"#).unwrap();
    let meta = metadata(&[("filename", json!("notes.md"))]);
    assert!(filter.matches(&meta));
}

#[test]
fn test_ingestion_status_transitions() {
    use IngestionStatus::*;

    assert!(Pending.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Indexed));
    assert!(Processing.can_transition_to(Failed));
    assert!(!Indexed.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Processing));
    assert!(!Processing.can_transition_to(Pending));
    assert!(Indexed.is_terminal());
    assert!(!Processing.is_terminal());
}

#[test]
fn test_ingestion_report_lifecycle() {
    let mut report = IngestionReport::new("doc-1", "a.txt", "notes");
    assert_eq!(report.status(), IngestionStatus::Pending);

    report.begin();
    assert_eq!(report.status(), IngestionStatus::Processing);

    report.complete(4);
    assert_eq!(report.status(), IngestionStatus::Indexed);
    assert_eq!(report.chunk_count(), 4);

    // Terminal: later transitions are ignored
    report.fail("late failure");
    assert_eq!(report.status(), IngestionStatus::Indexed);
    assert!(report.error().is_none());
}

#[test]
fn test_ingestion_report_failure() {
    let mut report = IngestionReport::new("doc-2", "b.pdf", "notes");
    report.begin();
    report.fail("no text extracted");

    assert_eq!(report.status(), IngestionStatus::Failed);
    assert_eq!(report.chunk_count(), 0);
    assert_eq!(report.error(), Some("no text extracted"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "failed");
}

#[test]
fn test_chunk_source_accessor() {
    let chunk = Chunk::new(
        "id",
        "text",
        vec![0.0; 4],
        metadata(&[(metadata_keys::SOURCE, json!("/docs/a.txt"))]),
    );
    assert_eq!(chunk.source(), Some("/docs/a.txt"));

    let anonymous = Chunk::new("id", "text", vec![], Metadata::new());
    assert_eq!(anonymous.source(), None);
}

#[test]
fn test_retrieval_result_alignment_and_formatting() {
    let sources = vec![
        Source {
            text: "first".to_string(),
            metadata: metadata(&[("filename", json!("a.txt"))]),
            score: 0.9,
            vector_score: 0.8,
            lexical_score: Some(1.0),
        },
        Source {
            text: "second".to_string(),
            metadata: Metadata::new(),
            score: 0.4,
            vector_score: 0.4,
            lexical_score: None,
        },
    ];

    let result = RetrievalResult::from_sources("q", sources, Duration::from_millis(3));
    assert_eq!(result.contexts, vec!["first", "second"]);
    assert_eq!(result.contexts.len(), result.sources.len());

    let context = result.format_context();
    assert!(context.contains("---DOCUMENT 1---\nfirst"));
    assert!(context.contains("---DOCUMENT 2---\nsecond"));

    let sources = result.format_sources();
    assert!(sources.contains("Source 1 [a.txt]: first"));
    assert!(sources.contains("Source 2 [Source 2]: second"));
}

#[test]
fn test_create_outcome_serialization() {
    assert_eq!(
        serde_json::to_string(&CreateOutcome::AlreadyExists).unwrap(),
        "\"already_exists\""
    );
}
