//! Embedding backend implementations
//!
//! The `hash` and `token` backends are deterministic and run without any
//! model files; the `onnx` backend (feature-gated) runs a real
//! sentence-embedding model.

use crate::embedding::{l2_normalize, Embedder, Embedding, EmbeddingConfig};
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

/// Seeded pseudo-random embedder.
///
/// Embeddings are a deterministic function of `(seed, text)`, so rebuilding
/// an index from the same corpus reproduces the same vectors exactly.
pub struct HashEmbedder {
    config: EmbeddingConfig,
    dimension: usize,
    seed: u64,
}

impl HashEmbedder {
    /// Create a new hash embedder with the default seed
    pub fn new(config: EmbeddingConfig, dimension: usize) -> Self {
        Self::with_seed(config, dimension, 0)
    }

    /// Create a new hash embedder with an explicit seed
    pub fn with_seed(config: EmbeddingConfig, dimension: usize, seed: u64) -> Self {
        Self {
            config,
            dimension,
            seed,
        }
    }

    fn generate_embedding(&self, text: &str) -> Embedding {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        text.hash(&mut hasher);

        // LCG over the text hash
        let mut state = hasher.finish();
        let mut embedding = Vec::with_capacity(self.dimension);

        for _ in 0..self.dimension {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            let value = ((state / 65536) % 10000) as f32 / 10000.0 - 0.5;
            embedding.push(value);
        }

        if self.config.normalize {
            l2_normalize(&mut embedding);
        }

        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|&t| self.generate_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Hashed bag-of-words embedder with term-frequency weighting.
///
/// Texts sharing tokens get correlated vectors, so cosine similarity is
/// meaningful. This is the default model-free backend.
pub struct TokenEmbedder {
    config: EmbeddingConfig,
    dimension: usize,
}

impl TokenEmbedder {
    /// Create a new token-based embedder
    pub fn new(config: EmbeddingConfig, dimension: usize) -> Self {
        Self { config, dimension }
    }

    fn generate_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0; self.dimension];

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .collect();

        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            embedding[idx] += 1.0;
        }

        let total_tokens = tokens.len() as f32;
        for val in embedding.iter_mut() {
            *val /= total_tokens;
        }

        if self.config.normalize {
            l2_normalize(&mut embedding);
        }

        embedding
    }
}

impl Embedder for TokenEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|&t| self.generate_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Create an embedder by backend name
pub fn create_embedder(
    backend: &str,
    config: EmbeddingConfig,
    dimension: usize,
) -> Result<Arc<dyn Embedder>> {
    match backend {
        "hash" => Ok(Arc::new(HashEmbedder::new(config, dimension))),
        "token" => Ok(Arc::new(TokenEmbedder::new(config, dimension))),
        #[cfg(feature = "onnx")]
        "onnx" => {
            anyhow::bail!("ONNX backend requires a model path. Use OnnxEmbedder::new() instead.");
        }
        _ => {
            tracing::warn!("Unknown embedding backend '{}', using token embedder", backend);
            Ok(Arc::new(TokenEmbedder::new(config, dimension)))
        }
    }
}
