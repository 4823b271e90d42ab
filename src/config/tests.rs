use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.chunking.max_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
    assert_eq!(config.retrieval.top_k, 5);
    assert!(config.retrieval.hybrid);
    assert_eq!(config.retrieval.lexical_weight, 0.5);
    assert_eq!(config.retrieval.vector_weight, 0.5);
    assert_eq!(config.retrieval.normalization, ScoreNormalization::MinMax);
    assert_eq!(config.embedding.provider, EmbeddingBackend::Fastembed);
}

#[test]
fn test_offline_config() {
    let config = Config::offline("/tmp/rag-data");
    assert_eq!(config.embedding.provider, EmbeddingBackend::Hashing);
    assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/rag-data"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_overlap_not_smaller_than_size() {
    let mut config = Config::default();
    config.chunking.max_size = 200;
    config.chunking.overlap = 200;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chunking.overlap"));
}

#[test]
fn test_validate_rejects_zero_values() {
    let mut config = Config::default();
    config.embedding.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.chunking.max_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.max_cached_collections = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_weights() {
    let mut config = Config::default();
    config.retrieval.lexical_weight = -0.1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.lexical_weight = 0.0;
    config.retrieval.vector_weight = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.vector_weight = f32::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_accepts_pure_lexical_weights() {
    let mut config = Config::default();
    config.retrieval.lexical_weight = 1.0;
    config.retrieval.vector_weight = 0.0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::offline(temp_dir.path().join("data"));
    config.retrieval.normalization = ScoreNormalization::Rank;
    config.chunking.max_size = 512;
    config.chunking.overlap = 64;

    config.save(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[retrieval]
top_k = 8
normalization = "rank"

[embedding]
provider = "hashing"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.retrieval.normalization, ScoreNormalization::Rank);
    assert_eq!(config.embedding.provider, EmbeddingBackend::Hashing);
    assert_eq!(config.chunking.max_size, 1000);
    assert!(config.retrieval.hybrid);
}

#[test]
fn test_from_file_missing() {
    let result = Config::from_file(Path::new("/nonexistent/turbochat/config.toml"));
    assert!(matches!(
        result,
        Err(RagError::Config(ConfigError::FileNotFound(_)))
    ));
}

#[test]
fn test_from_file_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[retrieval\ntop_k = ").unwrap();

    let result = Config::from_file(&path);
    assert!(matches!(
        result,
        Err(RagError::Config(ConfigError::ParseFailed(_)))
    ));
}

#[test]
fn test_from_file_unknown_provider() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[embedding]\nprovider = \"openai\"\n").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_overrides_applied() {
    let mut config = Config::default();
    config.apply_overrides_from(lookup(&[
        ("DATA_DIR", "/srv/rag"),
        ("EMBEDDING_PROVIDER", "Hashing"),
        ("MODEL", "BAAI/bge-small-en-v1.5"),
        ("BATCH_SIZE", "8"),
        ("CHUNK_SIZE", "600"),
        ("CHUNK_OVERLAP", "50"),
        ("TOP_K", "3"),
    ]));

    assert_eq!(config.storage.data_dir, PathBuf::from("/srv/rag"));
    assert_eq!(config.embedding.provider, EmbeddingBackend::Hashing);
    assert_eq!(config.embedding.model_name, "BAAI/bge-small-en-v1.5");
    assert_eq!(config.embedding.batch_size, 8);
    assert_eq!(config.chunking.max_size, 600);
    assert_eq!(config.chunking.overlap, 50);
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
fn test_invalid_overrides_ignored() {
    let mut config = Config::default();
    config.apply_overrides_from(lookup(&[
        ("BATCH_SIZE", "lots"),
        ("EMBEDDING_PROVIDER", "openai"),
    ]));

    assert_eq!(config.embedding.batch_size, 32);
    assert_eq!(config.embedding.provider, EmbeddingBackend::Fastembed);
}
