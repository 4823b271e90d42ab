use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// FastEmbed-based embedding provider (default: all-MiniLM-L6-v2)
pub struct FastEmbedManager {
    // fastembed's embed takes &mut self
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedManager {
    /// Create a new FastEmbedManager with the default model (all-MiniLM-L6-v2)
    pub fn new() -> Result<Self, EmbeddingError> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2")
    }

    /// Create a manager from a configured model name
    ///
    /// Accepts the short names used in configuration files as well as the
    /// Hugging Face identifiers.
    pub fn from_model_name(name: &str) -> Result<Self, EmbeddingError> {
        let model = match name {
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                EmbeddingModel::AllMiniLML6V2
            }
            "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
                EmbeddingModel::AllMiniLML12V2
            }
            "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            other => return Err(EmbeddingError::UnknownModel(other.to_string())),
        };
        Self::with_model(model, name)
    }

    /// Create a new FastEmbedManager with a specific model
    pub fn with_model(model: EmbeddingModel, name: &str) -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing FastEmbed model: {:?}", model);

        let dimension = match model {
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::AllMiniLML12V2 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            EmbeddingModel::BGESmallENV15 => 384,
            _ => 384,
        };

        let options = InitOptions::new(model).with_show_download_progress(true);

        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            dimension,
            model_name: name.to_string(),
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;

        let embeddings = model
            .embed(texts, None)
            .context("Failed to generate embeddings")?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
