//! Shortlist reranking
//!
//! A reranker scores each `(query, candidate)` pair jointly and reorders
//! the fused shortlist. Rerankers are pure per call: no state is carried
//! across queries.

use crate::corpus::RecordId;
use anyhow::Result;
use std::sync::Arc;

/// A fused candidate handed to the reranker
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Record id
    pub id: RecordId,
    /// Record text
    pub text: &'a str,
}

/// Trait for pairwise relevance rerankers
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` by descending relevance to `query` and return
    /// at most `n` record ids. An empty candidate list must return empty
    /// without invoking any underlying model.
    fn rerank(&self, query: &str, candidates: &[Candidate<'_>], n: usize) -> Result<Vec<RecordId>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Deterministic model-free reranker.
///
/// Scores a candidate by the fraction of query tokens (lowercased,
/// whitespace split) that occur in the candidate text. The sort is stable,
/// so score ties keep the incoming (fusion) order.
pub struct TokenOverlapReranker;

impl TokenOverlapReranker {
    fn score(query_tokens: &[String], text: &str) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }

        let text_lower = text.to_lowercase();
        let doc_tokens: std::collections::HashSet<&str> =
            text_lower.split_whitespace().collect();

        let matched = query_tokens
            .iter()
            .filter(|t| doc_tokens.contains(t.as_str()))
            .count();
        matched as f32 / query_tokens.len() as f32
    }
}

impl Reranker for TokenOverlapReranker {
    fn rerank(&self, query: &str, candidates: &[Candidate<'_>], n: usize) -> Result<Vec<RecordId>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(RecordId, f32)> = candidates
            .iter()
            .map(|c| (c.id, Self::score(&query_tokens, c.text)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(n);

        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }

    fn model_name(&self) -> &str {
        "token-overlap"
    }
}

/// Create a reranker by backend name
pub fn create_reranker(backend: &str) -> Result<Arc<dyn Reranker>> {
    match backend {
        "overlap" => Ok(Arc::new(TokenOverlapReranker)),
        #[cfg(feature = "onnx")]
        "onnx" => {
            anyhow::bail!("ONNX reranker requires a model path. Use CrossEncoderReranker::new() instead.");
        }
        _ => {
            tracing::warn!("Unknown reranker backend '{}', using token overlap", backend);
            Ok(Arc::new(TokenOverlapReranker))
        }
    }
}

#[cfg(feature = "onnx")]
pub use cross_encoder::CrossEncoderReranker;

#[cfg(feature = "onnx")]
mod cross_encoder {
    use super::{Candidate, Reranker};
    use crate::corpus::RecordId;
    use anyhow::{Context, Result};
    use ndarray::Array2;
    use once_cell::sync::Lazy;
    use onnxruntime::{
        environment::Environment, session::Session, GraphOptimizationLevel, LoggingLevel,
    };
    use std::path::Path;
    use std::sync::Mutex;
    use tokenizers::Tokenizer;

    static ONNX_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
        Environment::builder()
            .with_name("medsage-rerank")
            .with_log_level(LoggingLevel::Warning)
            .build()
            .expect("Failed to create ONNX environment")
    });

    /// Sigmoid activation: logit -> score in [0, 1]
    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    /// Cross-encoder reranker backed by an ms-marco MiniLM-class ONNX model.
    ///
    /// Query and candidate are tokenized together as one pair, so the model
    /// attends across both texts; the raw logit is passed through a sigmoid.
    pub struct CrossEncoderReranker {
        session: Mutex<Session<'static>>,
        tokenizer: Tokenizer,
        model_name: String,
        max_length: usize,
    }

    impl CrossEncoderReranker {
        /// Load a cross-encoder model from a directory containing
        /// `model.onnx` and `tokenizer.json`.
        pub fn new(model_dir: &Path, model_name: &str, max_length: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                anyhow::bail!("Model file not found: {:?}", model_path);
            }
            if !tokenizer_path.exists() {
                anyhow::bail!("Tokenizer file not found: {:?}", tokenizer_path);
            }

            tracing::info!("Loading cross-encoder model from {:?}", model_dir);

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
                model_name: model_name.to_string(),
                max_length,
            })
        }

        fn score_pair(&self, query: &str, text: &str) -> Result<f32> {
            let encoding = self
                .tokenizer
                .encode((query, text), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

            let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&i| i64::from(i)).collect();
            let mut mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect();
            let mut type_ids: Vec<i64> = encoding
                .get_type_ids()
                .iter()
                .map(|&t| i64::from(t))
                .collect();

            if ids.len() > self.max_length {
                ids.truncate(self.max_length);
                mask.truncate(self.max_length);
                type_ids.truncate(self.max_length);
            }

            let seq_len = ids.len();
            let input_ids = Array2::from_shape_vec((1, seq_len), ids)?;
            let attention_mask = Array2::from_shape_vec((1, seq_len), mask)?;
            let token_type_ids = Array2::from_shape_vec((1, seq_len), type_ids)?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session mutex poisoned"))?;

            let outputs: Vec<onnxruntime::tensor::OrtOwnedTensor<f32, _>> = session
                .run(vec![
                    input_ids.into_dyn(),
                    attention_mask.into_dyn(),
                    token_type_ids.into_dyn(),
                ])
                .context("Cross-encoder inference failed")?;

            let logit = outputs
                .first()
                .and_then(|t| t.iter().next().copied())
                .context("Cross-encoder produced no output logit")?;

            Ok(sigmoid(logit))
        }
    }

    impl Reranker for CrossEncoderReranker {
        fn rerank(
            &self,
            query: &str,
            candidates: &[Candidate<'_>],
            n: usize,
        ) -> Result<Vec<RecordId>> {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }

            let mut scored = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let score = self.score_pair(query, candidate.text)?;
                scored.push((candidate.id, score));
            }

            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            scored.truncate(n);

            Ok(scored.into_iter().map(|(id, _)| id).collect())
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_candidates_return_empty() {
        let reranker = TokenOverlapReranker;
        let result = reranker.rerank("any query", &[], 5).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_overlap_orders_by_shared_tokens() {
        let reranker = TokenOverlapReranker;
        let candidates = vec![
            Candidate { id: 0, text: "fever and cough are symptoms of flu" },
            Candidate { id: 1, text: "chest pain may indicate cardiac issues" },
        ];

        let result = reranker.rerank("I have chest pain", &candidates, 2).unwrap();
        assert_eq!(result, vec![1, 0]);
    }

    #[test]
    fn test_overlap_is_case_insensitive() {
        let reranker = TokenOverlapReranker;
        let candidates = vec![
            Candidate { id: 0, text: "Chest Pain overview" },
            Candidate { id: 1, text: "unrelated topic" },
        ];

        let result = reranker.rerank("chest pain", &candidates, 2).unwrap();
        assert_eq!(result[0], 0);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let reranker = TokenOverlapReranker;
        let candidates = vec![
            Candidate { id: 9, text: "no overlap here" },
            Candidate { id: 4, text: "none either" },
        ];

        let result = reranker.rerank("completely different words", &candidates, 2).unwrap();
        assert_eq!(result, vec![9, 4]);
    }

    #[test]
    fn test_returns_at_most_n() {
        let reranker = TokenOverlapReranker;
        let candidates = vec![
            Candidate { id: 0, text: "chest pain" },
            Candidate { id: 1, text: "chest" },
            Candidate { id: 2, text: "pain" },
        ];

        let result = reranker.rerank("chest pain", &candidates, 2).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], 0);
    }
}
