//! Retrieval quality evaluation
//!
//! Measures Hit Rate@K and MRR@K over a set of gold queries. A retrieved
//! document counts as a match when its embedding cosine similarity to any
//! expected document reaches a threshold, so retrieval phrasing does not
//! need to match the gold text verbatim.

use crate::embedding::{cosine_similarity, Embedder};
use crate::retrieval::HybridRetriever;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Default cosine-similarity threshold for the semantic judge
pub const DEFAULT_SIM_THRESHOLD: f32 = 0.85;
/// Default top-K cutoff
pub const DEFAULT_K: usize = 10;

/// One gold evaluation query
#[derive(Debug, Clone)]
pub struct EvalQuery {
    /// Query text
    pub query: String,
    /// Gold-relevant document texts
    pub relevant: Vec<String>,
}

/// Aggregated evaluation metrics
#[derive(Debug, Clone, Default)]
pub struct EvalSummary {
    /// Hit Rate@K as a percentage
    pub hit_rate_pct: f64,
    /// Mean Reciprocal Rank@K
    pub mrr: f64,
    /// Top-K cutoff used
    pub k: usize,
    /// Queries that contributed to the averages
    pub evaluated: usize,
    /// Queries skipped for missing query text or gold documents
    pub skipped: usize,
}

impl std::fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Evaluation Summary ({} queries, {} skipped):", self.evaluated, self.skipped)?;
        writeln!(f, "  Hit Rate@{}: {:.2}%", self.k, self.hit_rate_pct)?;
        writeln!(f, "  MRR@{}: {:.4}", self.k, self.mrr)?;
        Ok(())
    }
}

/// Load evaluation queries from a CSV with a `query` column and one or
/// more `relevant_doc_N` columns. Rows missing the query or every relevant
/// document are kept here and skipped (with a warning) during evaluation.
pub fn load_eval_csv(path: impl AsRef<Path>) -> Result<Vec<EvalQuery>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(format!("Failed to open evaluation CSV: {:?}", path))?;

    let headers = reader.headers()?.clone();
    let query_col = headers
        .iter()
        .position(|h| h == "query")
        .context("Evaluation CSV has no 'query' column")?;
    let relevant_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with("relevant_doc_"))
        .map(|(i, _)| i)
        .collect();

    let mut queries = Vec::new();
    for row in reader.records() {
        let row = row.context("Failed to parse evaluation CSV row")?;
        let query = row.get(query_col).unwrap_or("").trim().to_string();
        let relevant: Vec<String> = relevant_cols
            .iter()
            .filter_map(|&i| row.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        queries.push(EvalQuery { query, relevant });
    }

    tracing::info!("Loaded {} evaluation queries from {:?}", queries.len(), path);
    Ok(queries)
}

/// Evaluates a retriever with a semantic-similarity judge
pub struct Evaluator {
    embedder: Arc<dyn Embedder>,
    k: usize,
    threshold: f32,
}

impl Evaluator {
    /// Create an evaluator with explicit cutoff and threshold
    pub fn new(embedder: Arc<dyn Embedder>, k: usize, threshold: f32) -> Self {
        Self {
            embedder,
            k,
            threshold,
        }
    }

    /// Hit and reciprocal rank for one query's retrieved list.
    ///
    /// Returns `(1, 1/rank)` for the first retrieved document whose cosine
    /// similarity to any expected document reaches the threshold within the
    /// top K, else `(0, 0.0)`.
    pub fn judge(&self, retrieved: &[String], relevant: &[String]) -> Result<(u32, f64)> {
        let retrieved: Vec<&String> = retrieved
            .iter()
            .take(self.k)
            .filter(|d| !d.trim().is_empty())
            .collect();
        let relevant: Vec<&String> = relevant.iter().filter(|d| !d.trim().is_empty()).collect();

        if retrieved.is_empty() || relevant.is_empty() {
            return Ok((0, 0.0));
        }

        let relevant_texts: Vec<&str> = relevant.iter().map(|s| s.as_str()).collect();
        let relevant_embeddings = self.embedder.embed_batch(&relevant_texts)?;

        for (rank, doc) in retrieved.iter().enumerate() {
            let doc_embedding = self.embedder.embed(doc)?;
            let max_similarity = relevant_embeddings
                .iter()
                .map(|r| cosine_similarity(&doc_embedding, r))
                .fold(f32::NEG_INFINITY, f32::max);

            if max_similarity >= self.threshold {
                let rank = rank + 1;
                tracing::debug!("Semantic match at rank {} (cos {:.4})", rank, max_similarity);
                return Ok((1, 1.0 / rank as f64));
            }
        }

        Ok((0, 0.0))
    }

    /// Run the retriever over every usable query and aggregate metrics.
    ///
    /// Queries with no query text or no gold documents are skipped with a
    /// warning and excluded from the denominator.
    pub fn evaluate(&self, retriever: &HybridRetriever, queries: &[EvalQuery]) -> Result<EvalSummary> {
        let mut total_hits = 0u32;
        let mut total_rr = 0.0f64;
        let mut evaluated = 0usize;
        let mut skipped = 0usize;

        for (i, q) in queries.iter().enumerate() {
            if q.query.trim().is_empty() || q.relevant.iter().all(|d| d.trim().is_empty()) {
                tracing::warn!("Skipping query {}: missing query or gold documents", i + 1);
                skipped += 1;
                continue;
            }

            let retrieved = retriever.search_documents(
                &q.query,
                self.k.max(50),
                self.k.max(25),
                self.k,
            )?;

            let (hit, rr) = self.judge(&retrieved, &q.relevant)?;
            tracing::debug!("Query {}: hit={}, rr={:.4}", i + 1, hit, rr);
            total_hits += hit;
            total_rr += rr;
            evaluated += 1;
        }

        let summary = if evaluated > 0 {
            EvalSummary {
                hit_rate_pct: f64::from(total_hits) / evaluated as f64 * 100.0,
                mrr: total_rr / evaluated as f64,
                k: self.k,
                evaluated,
                skipped,
            }
        } else {
            EvalSummary {
                k: self.k,
                skipped,
                ..Default::default()
            }
        };

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusStore;
    use crate::embedding::{EmbeddingConfig, TokenEmbedder};
    use crate::index::{IndexBuilder, IndexBundle, IndexManifest};
    use crate::retrieval::{SearchConfig, TokenOverlapReranker};
    use std::io::Write;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(TokenEmbedder::new(EmbeddingConfig::default(), 128))
    }

    fn retriever_over(texts: Vec<&str>) -> HybridRetriever {
        let corpus = CorpusStore::from_texts(texts);
        let emb = embedder();
        let (dense, sparse) = IndexBuilder::new(emb.clone()).build(&corpus).unwrap();
        let manifest = IndexManifest {
            model_name: emb.model_name().to_string(),
            dimension: dense.dimension(),
            num_records: corpus.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
            corpus_fingerprint: corpus.fingerprint(),
        };
        HybridRetriever::new(
            IndexBundle { corpus, dense, sparse, manifest },
            emb,
            Arc::new(TokenOverlapReranker),
            SearchConfig::default(),
        )
    }

    #[test]
    fn test_identical_text_scores_perfect_hit() {
        let evaluator = Evaluator::new(embedder(), 10, DEFAULT_SIM_THRESHOLD);

        let doc = "chest pain may indicate cardiac issues".to_string();
        let (hit, rr) = evaluator.judge(&[doc.clone()], &[doc]).unwrap();
        assert_eq!(hit, 1);
        assert!((rr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let evaluator = Evaluator::new(embedder(), 10, DEFAULT_SIM_THRESHOLD);

        let (hit, rr) = evaluator
            .judge(
                &["entirely unrelated retrieved text".to_string()],
                &["gold document about cardiology".to_string()],
            )
            .unwrap();
        assert_eq!(hit, 0);
        assert!(rr.abs() < 1e-9);
    }

    #[test]
    fn test_match_beyond_k_does_not_count() {
        let evaluator = Evaluator::new(embedder(), 1, DEFAULT_SIM_THRESHOLD);

        let gold = "chest pain may indicate cardiac issues".to_string();
        let retrieved = vec!["first unrelated document text".to_string(), gold.clone()];

        let (hit, _) = evaluator.judge(&retrieved, &[gold]).unwrap();
        assert_eq!(hit, 0);
    }

    #[test]
    fn test_reciprocal_rank_uses_first_match() {
        let evaluator = Evaluator::new(embedder(), 10, DEFAULT_SIM_THRESHOLD);

        let gold = "chest pain may indicate cardiac issues".to_string();
        let retrieved = vec!["first unrelated document text".to_string(), gold.clone()];

        let (hit, rr) = evaluator.judge(&retrieved, &[gold]).unwrap();
        assert_eq!(hit, 1);
        assert!((rr - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_skips_unusable_queries() {
        let retriever = retriever_over(vec![
            "fever and cough are symptoms of flu",
            "chest pain may indicate cardiac issues",
        ]);
        let evaluator = Evaluator::new(embedder(), 10, DEFAULT_SIM_THRESHOLD);

        let queries = vec![
            EvalQuery {
                query: "I have chest pain".to_string(),
                relevant: vec!["chest pain may indicate cardiac issues".to_string()],
            },
            EvalQuery {
                query: String::new(),
                relevant: vec!["unused".to_string()],
            },
            EvalQuery {
                query: "has no gold documents".to_string(),
                relevant: vec![],
            },
        ];

        let summary = evaluator.evaluate(&retriever, &queries).unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.skipped, 2);
        assert!((summary.hit_rate_pct - 100.0).abs() < 1e-9);
        assert!((summary.mrr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_eval_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "query,relevant_doc_1,relevant_doc_2").unwrap();
        writeln!(file, "what causes chest pain,cardiac issues cause chest pain,").unwrap();
        writeln!(file, ",orphaned gold doc,").unwrap();
        file.flush().unwrap();

        let queries = load_eval_csv(file.path()).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].relevant.len(), 1);
        assert!(queries[1].query.is_empty());
    }
}
