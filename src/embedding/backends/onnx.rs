//! ONNX Runtime embedding backend
//!
//! Runs a MiniLM-class sentence-embedding model (mean pooling over the last
//! hidden state, then L2 normalization). Requires `model.onnx` and
//! `tokenizer.json` in the model directory.

use crate::embedding::{apply_pooling, l2_normalize, Embedder, Embedding, EmbeddingConfig};
use anyhow::{Context, Result};
use ndarray::Array2;
use once_cell::sync::Lazy;
use onnxruntime::{environment::Environment, session::Session, GraphOptimizationLevel, LoggingLevel};
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

/// Global ONNX environment (lazy initialized)
static ONNX_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
    Environment::builder()
        .with_name("medsage")
        .with_log_level(LoggingLevel::Warning)
        .build()
        .expect("Failed to create ONNX environment")
});

/// ONNX-based sentence embedder
pub struct OnnxEmbedder {
    // Session::run takes &mut self
    session: Mutex<Session<'static>>,
    tokenizer: Tokenizer,
    config: EmbeddingConfig,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load a sentence-embedding model from a directory containing
    /// `model.onnx` and `tokenizer.json`.
    pub fn new(model_dir: &Path, config: EmbeddingConfig, dimension: usize) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!("Model file not found: {:?}", model_path);
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {:?}", tokenizer_path);
        }

        tracing::info!("Loading ONNX embedding model from {:?}", model_dir);

        let session = ONNX_ENVIRONMENT
            .new_session_builder()?
            .with_optimization_level(GraphOptimizationLevel::All)?
            .with_number_threads(4)?
            .with_model_from_file(&model_path)
            .context("Failed to create ONNX session")?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
            dimension,
        })
    }

    fn encode(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&i| i64::from(i)).collect();
        let mut mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();

        if ids.len() > self.config.max_length {
            ids.truncate(self.config.max_length);
            mask.truncate(self.config.max_length);
        }

        Ok((ids, mask))
    }

    fn run_model(&self, ids: Vec<i64>, mask: Vec<i64>) -> Result<Embedding> {
        let seq_len = ids.len();
        let input_ids = Array2::from_shape_vec((1, seq_len), ids)?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), mask)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session mutex poisoned"))?;

        let outputs: Vec<onnxruntime::tensor::OrtOwnedTensor<f32, _>> = session
            .run(vec![input_ids.into_dyn(), attention_mask.into_dyn()])
            .context("ONNX inference failed")?;

        let hidden = outputs
            .first()
            .context("ONNX model produced no output tensor")?;

        // [1, seq_len, dim] -> per-token vectors
        let flat: Vec<f32> = hidden.iter().copied().collect();
        if flat.len() != seq_len * self.dimension {
            anyhow::bail!(
                "Unexpected ONNX output size {} for seq_len {} and dimension {}",
                flat.len(),
                seq_len,
                self.dimension
            );
        }

        let token_embeddings: Vec<Vec<f32>> = flat
            .chunks(self.dimension)
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut embedding = apply_pooling(&token_embeddings, self.config.pooling)?;
        if self.config.normalize {
            l2_normalize(&mut embedding);
        }

        Ok(embedding)
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let (ids, mask) = self.encode(text)?;
        self.run_model(ids, mask)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|&t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
