// LanceDB is the embedded store: one table per collection, no server required
pub mod catalog;
pub mod lance_client;

pub use catalog::{Catalog, CatalogEntry};
pub use lance_client::LanceCollectionStore;

use crate::error::{RagError, StorageError};
use crate::types::{Chunk, CollectionInfo, CreateOutcome};

/// Maximum length of a collection name
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Consistent view of one collection at a given write generation
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub name: String,
    /// Number of committed writes observed by this store; changes on every write
    pub generation: u64,
    /// Chunks ordered by insertion sequence
    pub chunks: Vec<Chunk>,
}

/// Trait for the durable, collection-partitioned chunk store
///
/// Every write is all-or-nothing from a reader's point of view: a concurrent
/// `snapshot` observes either the full pre-write or the full post-write state.
#[async_trait::async_trait]
pub trait CollectionStore: Send + Sync {
    /// Create an empty collection
    async fn create(&self, name: &str, description: Option<&str>)
    -> Result<CreateOutcome, RagError>;

    /// Append chunks, creating the collection if needed; returns the number written
    async fn add(&self, name: &str, chunks: Vec<Chunk>) -> Result<usize, RagError>;

    /// Replace every chunk of `source` with `chunks` as one commit; on failure
    /// the previous chunks stay visible
    async fn replace_source(
        &self,
        name: &str,
        source: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize, RagError>;

    /// Remove every chunk of `source`; returns the number removed
    async fn delete_source(&self, name: &str, source: &str) -> Result<usize, RagError>;

    /// All collections with derived counts, sorted by name
    async fn list(&self) -> Result<Vec<CollectionInfo>, RagError>;

    /// Delete a collection; `false` if it did not exist (or the name is invalid)
    async fn delete(&self, name: &str) -> Result<bool, RagError>;

    /// Every chunk of a collection, in insertion order
    async fn snapshot(&self, name: &str) -> Result<CollectionSnapshot, RagError>;

    async fn exists(&self, name: &str) -> Result<bool, RagError>;

    /// Current write generation of a collection (0 if never written by this store)
    async fn generation(&self, name: &str) -> u64;

    /// Vector width every stored chunk must have
    fn dimension(&self) -> usize;
}

/// Check that a name can be used as a collection (and table) name
///
/// Names are 1-64 characters of `[A-Za-z0-9_.-]` and start with a letter or digit.
pub fn validate_collection_name(name: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidCollectionName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(invalid("name must be at most 64 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid("name must start with a letter or digit"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(invalid(
            "only letters, digits, '_', '-' and '.' are allowed",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        for name in ["biology", "Bio_101", "notes-2024", "v1.2", "a", "x".repeat(64).as_str()] {
            assert!(validate_collection_name(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_collection_names() {
        for name in [
            "",
            "_hidden",
            ".dot",
            "-dash",
            "has space",
            "slash/name",
            "quote'name",
            "ünïcode",
            "x".repeat(65).as_str(),
        ] {
            assert!(
                matches!(
                    validate_collection_name(name),
                    Err(StorageError::InvalidCollectionName { .. })
                ),
                "{}",
                name
            );
        }
    }
}
