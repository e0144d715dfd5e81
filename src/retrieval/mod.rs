//! Hybrid retrieval
//!
//! The [`HybridRetriever`] facade runs the dense and sparse searches,
//! fuses their rankings with RRF, reranks the fused shortlist with a
//! cross-encoder, and joins the winning record texts into one context
//! string.
//!
//! The retriever holds only immutable loaded state plus reference-counted
//! models, so concurrent queries need no locking.

use crate::corpus::{CorpusStore, RecordId};
use crate::embedding::Embedder;
use crate::index::{load_bundle, Bm25Index, DenseIndex, IndexBundle};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub mod fusion;
pub mod rerank;

// Re-exports
pub use fusion::{reciprocal_rank_fusion, RRF_K};
pub use rerank::{create_reranker, Candidate, Reranker, TokenOverlapReranker};
#[cfg(feature = "onnx")]
pub use rerank::CrossEncoderReranker;

/// Separator between documents in the returned context string
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Depth parameters for one hybrid search
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidates fetched from each of the dense and sparse paths
    pub retrieve_depth: usize,
    /// Fused candidates passed to the cross-encoder
    pub rerank_depth: usize,
    /// Documents returned in the final context
    pub final_depth: usize,
    /// RRF smoothing constant
    pub rrf_smoothing: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            retrieve_depth: 50,
            rerank_depth: 25,
            final_depth: 5,
            rrf_smoothing: RRF_K,
        }
    }
}

/// Hybrid retriever combining dense, sparse, fusion, and reranking stages
pub struct HybridRetriever {
    corpus: CorpusStore,
    dense: DenseIndex,
    sparse: Bm25Index,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    config: SearchConfig,
}

impl HybridRetriever {
    /// Assemble a retriever from already-built parts
    pub fn new(
        bundle: IndexBundle,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        config: SearchConfig,
    ) -> Self {
        Self {
            corpus: bundle.corpus,
            dense: bundle.dense,
            sparse: bundle.sparse,
            embedder,
            reranker,
            config,
        }
    }

    /// Load a persisted index bundle and wrap it in a retriever.
    ///
    /// Any missing or inconsistent artifact is a fatal startup error; the
    /// retriever never degrades to a single retrieval path.
    pub fn load(
        index_dir: &Path,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        config: SearchConfig,
    ) -> Result<Self> {
        let bundle = load_bundle(index_dir, embedder.as_ref())
            .context("Retriever refusing to start: index bundle unavailable")?;
        Ok(Self::new(bundle, embedder, reranker, config))
    }

    /// Number of corpus records behind this retriever
    pub fn num_records(&self) -> usize {
        self.corpus.len()
    }

    /// Hybrid search with the configured default depths, returning the
    /// joined context string.
    ///
    /// An empty context means "no relevant information found", not an
    /// error; an empty query is an invalid-input error.
    pub fn search(&self, query: &str) -> Result<String> {
        self.search_with_depths(
            query,
            self.config.retrieve_depth,
            self.config.rerank_depth,
            self.config.final_depth,
        )
    }

    /// Hybrid search with explicit depths, returning the joined context
    /// string.
    pub fn search_with_depths(
        &self,
        query: &str,
        retrieve_depth: usize,
        rerank_depth: usize,
        final_depth: usize,
    ) -> Result<String> {
        let docs = self.search_documents(query, retrieve_depth, rerank_depth, final_depth)?;
        Ok(docs.join(CONTEXT_SEPARATOR))
    }

    /// Hybrid search returning the final document texts as a list.
    ///
    /// Pipeline: dense + sparse at `retrieve_depth`, RRF fuse, top
    /// `rerank_depth` to the reranker, top `final_depth` resolved to text.
    pub fn search_documents(
        &self,
        query: &str,
        retrieve_depth: usize,
        rerank_depth: usize,
        final_depth: usize,
    ) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("Query must not be empty");
        }
        if retrieve_depth < rerank_depth || rerank_depth < final_depth {
            anyhow::bail!(
                "Invalid search depths: retrieve ({}) >= rerank ({}) >= final ({}) required",
                retrieve_depth,
                rerank_depth,
                final_depth
            );
        }
        if final_depth == 0 || self.corpus.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Hybrid search for '{}'", query);

        // Dense path: embed the query with the build-time model
        let query_embedding = self.embedder.embed(query).context("Failed to embed query")?;
        let dense_ranked: Vec<RecordId> = self
            .dense
            .search(&query_embedding, retrieve_depth)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        // Sparse path: BM25 over whitespace tokens
        let sparse_ranked: Vec<RecordId> = self
            .sparse
            .search(query, retrieve_depth)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        tracing::debug!(
            "Dense path: {} candidates, sparse path: {} candidates",
            dense_ranked.len(),
            sparse_ranked.len()
        );

        // Rank fusion
        let fused = reciprocal_rank_fusion(
            &dense_ranked,
            &sparse_ranked,
            rerank_depth,
            self.config.rrf_smoothing,
        );
        if fused.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!("RRF fused to {} unique candidates", fused.len());

        // Cross-encoder pass over the fused shortlist
        let candidates: Vec<Candidate<'_>> = fused
            .iter()
            .filter_map(|&(id, _)| {
                self.corpus.text(id).map(|text| Candidate { id, text })
            })
            .collect();
        let final_ids = self.reranker.rerank(query, &candidates, final_depth)?;

        Ok(final_ids
            .into_iter()
            .filter_map(|id| self.corpus.text(id).map(str::to_string))
            .collect())
    }
}
