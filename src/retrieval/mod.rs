//! Hybrid retrieval: BM25 and cosine rankings fused into one score
//!
//! Both rankings are computed over the candidate set (the chunks that pass the
//! metadata filter), normalized to [0, 1] independently, and combined with
//! configurable weights. Ties are broken by insertion order.

mod cache;

pub use cache::RetrievalCache;

use crate::bm25_search::LexicalIndex;
use crate::config::{RetrievalConfig, ScoreNormalization};
use crate::error::{RagError, StorageError};
use crate::types::{Chunk, MetadataFilter, Source};
use crate::vector_db::CollectionSnapshot;
use anyhow::Result;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

/// A collection snapshot together with its lexical index
#[derive(Debug)]
pub struct IndexedCollection {
    pub name: String,
    pub generation: u64,
    /// Chunks in insertion order; positions match the lexical index ids
    pub chunks: Arc<Vec<Chunk>>,
    pub lexical: Arc<LexicalIndex>,
}

impl IndexedCollection {
    /// Build the lexical index for a snapshot (CPU-bound)
    pub fn build(snapshot: CollectionSnapshot) -> Result<Self> {
        let lexical = LexicalIndex::build(snapshot.chunks.iter().map(|c| c.text.as_str()))?;
        Ok(Self {
            name: snapshot.name,
            generation: snapshot.generation,
            chunks: Arc::new(snapshot.chunks),
            lexical: Arc::new(lexical),
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// How the two rankings are weighted and normalized
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionPolicy {
    pub lexical_weight: f32,
    pub vector_weight: f32,
    pub normalization: ScoreNormalization,
}

impl FusionPolicy {
    /// Weights scaled to sum to 1 (equal weights if both are 0)
    pub fn normalized_weights(&self) -> (f32, f32) {
        let lexical = self.lexical_weight.max(0.0);
        let vector = self.vector_weight.max(0.0);
        let total = lexical + vector;
        if total <= 0.0 || !total.is_finite() {
            (0.5, 0.5)
        } else {
            (lexical / total, vector / total)
        }
    }
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for FusionPolicy {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            lexical_weight: config.lexical_weight,
            vector_weight: config.vector_weight,
            normalization: config.normalization,
        }
    }
}

/// Parameters of one retrieval call
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams<'a> {
    pub query_text: &'a str,
    pub query_vector: &'a [f32],
    pub top_k: usize,
    pub hybrid: bool,
    pub filter: Option<&'a MetadataFilter>,
}

/// Ranks the chunks of an indexed collection against a query
#[derive(Debug, Clone, Default)]
pub struct HybridRetriever {
    policy: FusionPolicy,
}

impl HybridRetriever {
    pub fn new(policy: FusionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    /// Return up to `top_k` sources ordered by descending fused score
    pub fn retrieve(
        &self,
        collection: &IndexedCollection,
        params: RetrievalParams<'_>,
    ) -> Result<Vec<Source>, RagError> {
        let chunks = collection.chunks.as_slice();

        let candidates: Vec<usize> = match params.filter.filter(|f| !f.is_empty()) {
            Some(filter) => (0..chunks.len())
                .filter(|&i| filter.matches(&chunks[i].metadata))
                .collect(),
            None => (0..chunks.len()).collect(),
        };

        if candidates.is_empty() || params.top_k == 0 {
            return Ok(Vec::new());
        }

        if let Some(&i) = candidates
            .iter()
            .find(|&&i| chunks[i].vector.len() != params.query_vector.len())
        {
            return Err(StorageError::DimensionMismatch {
                collection: collection.name.clone(),
                expected: chunks[i].vector.len(),
                actual: params.query_vector.len(),
            }
            .into());
        }

        let query_norm = l2_norm(params.query_vector);
        let cosine: Vec<f32> = candidates
            .par_iter()
            .map(|&i| cosine_with_norm(params.query_vector, query_norm, &chunks[i].vector))
            .collect();
        let vector_scores = normalize_scores(&cosine, self.policy.normalization);

        let lexical_scores = if params.hybrid {
            let all = collection.lexical.score_all(params.query_text)?;
            let raw: Vec<f32> = candidates
                .iter()
                .map(|&i| all.get(i).copied().unwrap_or(0.0))
                .collect();
            let mut normalized = normalize_scores(&raw, self.policy.normalization);
            // A chunk without any query term carries no lexical evidence
            for (n, r) in normalized.iter_mut().zip(&raw) {
                if *r <= 0.0 {
                    *n = 0.0;
                }
            }
            Some(normalized)
        } else {
            None
        };

        let (lexical_weight, vector_weight) = self.policy.normalized_weights();

        let mut ranked: Vec<(usize, f32)> = (0..candidates.len())
            .map(|c| {
                let score = match &lexical_scores {
                    Some(lex) => lexical_weight * lex[c] + vector_weight * vector_scores[c],
                    None => vector_scores[c],
                };
                (c, score.clamp(0.0, 1.0))
            })
            .collect();

        // Candidates are in insertion order, so a stable sort keeps ties in that order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(params.top_k);

        let sources = ranked
            .into_iter()
            .map(|(c, score)| {
                let chunk = &chunks[candidates[c]];
                Source {
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                    score,
                    vector_score: vector_scores[c],
                    lexical_score: lexical_scores.as_ref().map(|lex| lex[c]),
                }
            })
            .collect();

        Ok(sources)
    }
}

/// Map raw scores to [0, 1] with the given policy
///
/// Min-max over a zero range maps positive scores to 1 and the rest to 0.
/// Rank gives the best score 1 and each following distinct score
/// `1 - rank / n`, where `rank` counts strictly better scores.
pub fn normalize_scores(scores: &[f32], policy: ScoreNormalization) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    match policy {
        ScoreNormalization::MinMax => {
            let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
            let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;

            if range <= f32::EPSILON || !range.is_finite() {
                scores
                    .iter()
                    .map(|&s| if s > 0.0 { 1.0 } else { 0.0 })
                    .collect()
            } else {
                scores.iter().map(|&s| (s - min) / range).collect()
            }
        }
        ScoreNormalization::Rank => {
            let n = scores.len() as f32;
            let mut sorted: Vec<f32> = scores.to_vec();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

            scores
                .iter()
                .map(|&s| {
                    let better = sorted.partition_point(|&x| x > s);
                    1.0 - better as f32 / n
                })
                .collect()
        }
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_with_norm(query: &[f32], query_norm: f32, vector: &[f32]) -> f32 {
    let norm = l2_norm(vector);
    if query_norm == 0.0 || norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(vector).map(|(a, b)| a * b).sum();
    dot / (query_norm * norm)
}

/// Cosine similarity of two vectors; 0 if either has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norm(a, l2_norm(a), b)
}
