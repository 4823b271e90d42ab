mod fastembed_manager;
mod hashing;

pub use fastembed_manager::FastEmbedManager;
pub use hashing::{HASHING_MODEL_NAME, HashingEmbedder};

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{EmbeddingError, RagError};
use anyhow::Result;
use std::sync::Arc;

/// Trait for embedding generation
///
/// Implementations must be deterministic for a fixed model, and `embed_batch`
/// must return exactly what repeated calls to `embed` would.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Generate the embedding of a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
    }

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Construct the provider selected by the configuration
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    match config.provider {
        EmbeddingBackend::Fastembed => {
            let manager = FastEmbedManager::from_model_name(&config.model_name)?;
            Ok(Arc::new(manager))
        }
        EmbeddingBackend::Hashing => {
            if config.dimension == 0 {
                return Err(EmbeddingError::InitializationFailed(
                    "hashing dimension must be greater than 0".to_string(),
                )
                .into());
            }
            Ok(Arc::new(HashingEmbedder::new(config.dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_hashing_provider() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Hashing,
            dimension: 64,
            ..Default::default()
        };

        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.dimension(), 64);
        assert_eq!(provider.model_name(), HASHING_MODEL_NAME);
    }

    #[test]
    fn test_build_fastembed_unknown_model() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Fastembed,
            model_name: "not-a-real-model".to_string(),
            ..Default::default()
        };

        let err = build_provider(&config).err().unwrap();
        assert!(matches!(
            err,
            RagError::Embedding(EmbeddingError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_default_embed_matches_batch() {
        let provider = HashingEmbedder::new(32);
        let single = provider.embed("chlorophyll absorbs light").unwrap();
        let batch = provider
            .embed_batch(vec!["chlorophyll absorbs light".to_string()])
            .unwrap();
        assert_eq!(single, batch[0]);
    }
}
