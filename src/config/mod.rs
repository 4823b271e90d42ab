/// Configuration system for turbochat-rag
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
///
/// The resulting [`Config`] is passed explicitly to the ingestion pipeline and
/// the query service at construction time; nothing reads it from global state.
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "TURBOCHAT_RAG_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Persistent storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and score fusion configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Persistent storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Root directory holding the collection tables and the catalog
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Which embedding implementation to construct
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Local ONNX models through fastembed
    Fastembed,
    /// Deterministic feature hashing, no model download
    Hashing,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_backend")]
    pub provider: EmbeddingBackend,

    /// Model name (e.g., "all-MiniLM-L6-v2", "BAAI/bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Vector width for the hashing provider (fastembed models fix their own)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Number of chunks embedded per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for one embedding batch
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Chunking configuration (sizes are in characters)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub max_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// How each ranking is mapped to [0, 1] before fusion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreNormalization {
    /// (s - min) / (max - min) over the candidate set
    #[default]
    MinMax,
    /// 1 - rank / n over the candidate set
    Rank,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Default number of chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Enable hybrid search (vector + BM25) by default
    #[serde(default = "default_hybrid_search")]
    pub hybrid: bool,

    /// Weight of the normalized BM25 score in the fused score
    #[serde(default = "default_fusion_weight")]
    pub lexical_weight: f32,

    /// Weight of the normalized cosine score in the fused score
    #[serde(default = "default_fusion_weight")]
    pub vector_weight: f32,

    #[serde(default)]
    pub normalization: ScoreNormalization,

    /// Upper bound on collections kept materialized in the query cache
    #[serde(default = "default_max_cached_collections")]
    pub max_cached_collections: usize,
}

fn default_data_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_data_path()
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Fastembed
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_hybrid_search() -> bool {
    true
}

fn default_fusion_weight() -> f32 {
    0.5
}

fn default_max_cached_collections() -> usize {
    16
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_backend(),
            model_name: default_model_name(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            hybrid: default_hybrid_search(),
            lexical_weight: default_fusion_weight(),
            vector_weight: default_fusion_weight(),
            normalization: ScoreNormalization::default(),
            max_cached_collections: default_max_cached_collections(),
        }
    }
}

impl Config {
    /// Configuration rooted at `data_dir` using the offline hashing embedder
    ///
    /// Convenient for tests and tools that must not download a model.
    pub fn offline(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config.embedding.provider = EmbeddingBackend::Hashing;
        config.embedding.model_name = crate::embedding::HASHING_MODEL_NAME.to_string();
        config
    }

    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        fn invalid(key: &str, reason: impl Into<String>) -> RagError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason: reason.into(),
            }
            .into()
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }

        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "must be greater than 0"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.chunking.max_size == 0 {
            return Err(invalid("chunking.max_size", "must be greater than 0"));
        }

        if self.chunking.overlap >= self.chunking.max_size {
            return Err(invalid(
                "chunking.overlap",
                format!(
                    "must be smaller than chunking.max_size ({}), got {}",
                    self.chunking.max_size, self.chunking.overlap
                ),
            ));
        }

        let weights = [
            ("retrieval.lexical_weight", self.retrieval.lexical_weight),
            ("retrieval.vector_weight", self.retrieval.vector_weight),
        ];
        for (key, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(
                    key,
                    format!("must be a non-negative number, got {}", weight),
                ));
            }
        }

        if self.retrieval.lexical_weight + self.retrieval.vector_weight <= 0.0 {
            return Err(invalid(
                "retrieval.vector_weight",
                "lexical and vector weights must not both be 0",
            ));
        }

        if self.retrieval.max_cached_collections == 0 {
            return Err(invalid(
                "retrieval.max_cached_collections",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup` (keys include [`ENV_PREFIX`])
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(dir) = var("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(provider) = var("EMBEDDING_PROVIDER") {
            match provider.to_ascii_lowercase().as_str() {
                "fastembed" => self.embedding.provider = EmbeddingBackend::Fastembed,
                "hashing" => self.embedding.provider = EmbeddingBackend::Hashing,
                other => tracing::warn!("Ignoring unknown embedding provider override: {}", other),
            }
        }

        if let Some(model) = var("MODEL") {
            self.embedding.model_name = model;
        }

        parse_override(var("BATCH_SIZE"), "BATCH_SIZE", &mut self.embedding.batch_size);
        parse_override(var("CHUNK_SIZE"), "CHUNK_SIZE", &mut self.chunking.max_size);
        parse_override(var("CHUNK_OVERLAP"), "CHUNK_OVERLAP", &mut self.chunking.overlap);
        parse_override(var("TOP_K"), "TOP_K", &mut self.retrieval.top_k);
    }

    /// Create a new Config with defaults, file contents and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn parse_override<T: std::str::FromStr>(value: Option<String>, name: &str, target: &mut T) {
    if let Some(raw) = value {
        match raw.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Ignoring invalid {}{} value: {}", ENV_PREFIX, name, raw),
        }
    }
}

#[cfg(test)]
mod tests;
