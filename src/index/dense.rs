//! Dense vector index
//!
//! Exact nearest-neighbor search over the full corpus. The original system
//! uses a flat vector store; an exact scan keeps rankings deterministic and
//! lets the bundle round-trip through serialization unchanged.
//!
//! Convention: results are ordered by **ascending cosine distance**
//! (`1 - cosine similarity`); ties are broken by insertion order.

use crate::corpus::RecordId;
use crate::embedding::{cosine_similarity, Embedding};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Flat dense vector index over record embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseIndex {
    /// Embedding dimension, constant across the index
    dimension: usize,
    /// Record ids, parallel to `vectors`
    ids: Vec<RecordId>,
    /// Record embeddings in insertion order
    vectors: Vec<Embedding>,
}

impl DenseIndex {
    /// Build a dense index from record ids and their embeddings.
    ///
    /// Every embedding must have the same dimensionality.
    pub fn build(ids: Vec<RecordId>, vectors: Vec<Embedding>) -> Result<Self> {
        if ids.len() != vectors.len() {
            anyhow::bail!(
                "Record count ({}) doesn't match embedding count ({})",
                ids.len(),
                vectors.len()
            );
        }
        if vectors.is_empty() {
            anyhow::bail!("Cannot build a dense index from an empty corpus");
        }

        let dimension = vectors[0].len();
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dimension {
                anyhow::bail!(
                    "Embedding dimension mismatch at record {}: expected {}, got {}",
                    ids[i],
                    dimension,
                    v.len()
                );
            }
        }

        tracing::debug!(
            "Built dense index: {} records, {} dimensions",
            ids.len(),
            dimension
        );

        Ok(Self {
            dimension,
            ids,
            vectors,
        })
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Top-`n` records by ascending cosine distance to the query embedding.
    ///
    /// A query embedding with the wrong dimensionality is a configuration
    /// error, not a recoverable one.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<(RecordId, f32)>> {
        if query.len() != self.dimension {
            anyhow::bail!(
                "Query embedding dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
        }

        let mut scored: Vec<(RecordId, f32)> = self
            .ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(&id, vec)| (id, 1.0 - cosine_similarity(query, vec)))
            .collect();

        // Stable sort keeps insertion order on distance ties
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(n);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_mismatched_dimensions() {
        let result = DenseIndex::build(vec![0, 1], vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(DenseIndex::build(vec![], vec![]).is_err());
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let index = DenseIndex::build(
            vec![0, 1, 2],
            vec![
                vec![1.0, 0.0],  // identical to query
                vec![0.0, 1.0],  // orthogonal
                vec![1.0, 1.0],  // in between
            ],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 2);
        assert_eq!(results[2].0, 1);
        assert!(results[0].1 < results[1].1);
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = DenseIndex::build(vec![0], vec![vec![1.0, 0.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_search_returns_at_most_n() {
        let index = DenseIndex::build(
            vec![0, 1, 2],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();

        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        // Both records are equidistant from the query
        let index = DenseIndex::build(vec![7, 3], vec![vec![0.0, 1.0], vec![0.0, 1.0]]).unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, 7);
        assert_eq!(results[1].0, 3);
    }
}
