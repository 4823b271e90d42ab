/// Centralized error types for turbochat-rag using thiserror
///
/// Every public operation either succeeds or returns one of these typed failures,
/// naming exactly which invariant could not be satisfied.
use thiserror::Error;

/// Main error type for the RAG engine
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while extracting text from a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unsupported or corrupt document '{path}': {reason}")]
    UnsupportedOrCorrupt { path: String, reason: String },
}

/// Errors related to the durable collection store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage failure: {0}")]
    Failure(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, found {actual} (reindex required)"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid collection name '{name}': {reason}")]
    InvalidCollectionName { name: String, reason: String },

    #[error("Corrupt chunk record in collection '{collection}': {reason}")]
    CorruptRecord { collection: String, reason: String },
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to the ingestion workflow
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to walk directory: {0}")]
    WalkFailed(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Ingestion was cancelled")]
    Cancelled,
}

/// Errors related to text chunking
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("No chunks generated from document: {0}")]
    NoChunksGenerated(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl StorageError {
    /// Wrap any displayable persistence error as an uncommitted storage failure
    pub fn failure(err: impl std::fmt::Display) -> Self {
        StorageError::Failure(err.to_string())
    }
}

impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    /// Check if this is a user error (bad input, missing collection) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RagError::Document(_)
                | RagError::Storage(StorageError::CollectionNotFound(_))
                | RagError::Storage(StorageError::InvalidCollectionName { .. })
                | RagError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    ///
    /// Storage failures leave the write uncommitted, so retrying is safe.
    /// Dimension mismatches require reindexing and are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::Storage(StorageError::Failure(_))
                | RagError::Embedding(EmbeddingError::Timeout(_))
                | RagError::Io(_)
        )
    }

    /// Check if this error reports a missing collection
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, RagError::Storage(StorageError::CollectionNotFound(_)))
    }
}
