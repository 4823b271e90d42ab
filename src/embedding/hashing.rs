use super::EmbeddingProvider;
use anyhow::Result;
use sha2::{Digest, Sha256};

/// Model name reported by [`HashingEmbedder`]
pub const HASHING_MODEL_NAME: &str = "hashing-trigram-v1";

/// Deterministic feature-hashing embedder
///
/// Lowercased words and their character trigrams are hashed with SHA-256 into
/// `dimension` signed buckets. No model download, same output on every
/// platform; texts that share vocabulary land close in cosine space.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            self.add_feature(&mut vector, "w", &word, 1.0);

            let padded: Vec<char> = format!("<{}>", word).chars().collect();
            for trigram in padded.windows(3) {
                let gram: String = trigram.iter().collect();
                self.add_feature(&mut vector, "t", &gram, 0.5);
            }
        }

        vector
    }

    fn add_feature(&self, vector: &mut [f32], kind: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        HASHING_MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn test_dimension_and_name() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(embedder.dimension(), 128);
        assert_eq!(embedder.model_name(), HASHING_MODEL_NAME);

        let vectors = embedder.embed_batch(vec!["hello".to_string()]).unwrap();
        assert_eq!(vectors[0].len(), 128);
    }

    #[test]
    fn test_deterministic() {
        let a = HashingEmbedder::new(64);
        let b = HashingEmbedder::new(64);
        assert_eq!(
            a.embed("Krebs cycle intermediates").unwrap(),
            b.embed("Krebs cycle intermediates").unwrap()
        );
    }

    #[test]
    fn test_batch_equals_single() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = embedder.embed_batch(texts.clone()).unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&embedder.embed(text).unwrap(), vector);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(
            embedder.embed("Photosynthesis").unwrap(),
            embedder.embed("photosynthesis").unwrap()
        );
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed("how do plants perform photosynthesis").unwrap();
        let related = embedder
            .embed("photosynthesis lets plants turn sunlight into sugar")
            .unwrap();
        let unrelated = embedder
            .embed("the treaty ended the thirty years war in europe")
            .unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let vector = embedder.embed("  ... ").unwrap();
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_empty_batch() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed_batch(vec![]).unwrap().is_empty());
    }
}
