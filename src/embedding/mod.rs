//! Embedding generation
//!
//! Trait-based embedding interface with pluggable backends. The default
//! backends are deterministic and model-free; the `onnx` feature adds a
//! real sentence-embedding model.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod backends;

// Re-exports
pub use backends::*;

/// Represents an embedding vector
pub type Embedding = Vec<f32>;

/// Pooling strategy for combining token embeddings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PoolingStrategy {
    /// Mean pooling across all tokens
    #[default]
    Mean,
    /// Use the CLS token embedding
    Cls,
    /// Max pooling across all tokens
    Max,
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name or path
    pub model_name: String,
    /// Pooling strategy
    pub pooling: PoolingStrategy,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Maximum sequence length
    pub max_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            pooling: PoolingStrategy::Mean,
            normalize: true,
            max_length: 512,
        }
    }
}

/// Trait for embedding models
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed multiple texts in batch
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Apply a pooling strategy to per-token embeddings
pub fn apply_pooling(token_embeddings: &[Vec<f32>], strategy: PoolingStrategy) -> Result<Embedding> {
    if token_embeddings.is_empty() {
        anyhow::bail!("Cannot pool empty token embeddings");
    }

    let dim = token_embeddings[0].len();

    match strategy {
        PoolingStrategy::Mean => {
            let mut result = vec![0.0; dim];
            let num_tokens = token_embeddings.len() as f32;

            for token_emb in token_embeddings {
                for (i, &val) in token_emb.iter().enumerate() {
                    result[i] += val / num_tokens;
                }
            }

            Ok(result)
        }
        PoolingStrategy::Cls => Ok(token_embeddings[0].clone()),
        PoolingStrategy::Max => {
            let mut result = vec![f32::NEG_INFINITY; dim];

            for token_emb in token_embeddings {
                for (i, &val) in token_emb.iter().enumerate() {
                    result[i] = result[i].max(val);
                }
            }

            Ok(result)
        }
    }
}

/// L2-normalize an embedding in place
pub fn l2_normalize(embedding: &mut Embedding) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for val in embedding.iter_mut() {
            *val /= norm;
        }
    }
}

/// Cosine similarity between two embeddings (0.0 on dimension mismatch or
/// zero vectors)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
