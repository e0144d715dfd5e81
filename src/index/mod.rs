//! Retrieval indexes
//!
//! The index builder produces a dense vector index and a sparse BM25 index
//! from one corpus and persists them together as a single bundle.

use serde::{Deserialize, Serialize};

pub mod builder;
pub mod dense;
pub mod sparse;

// Re-exports
pub use builder::*;
pub use dense::*;
pub use sparse::*;

/// File names inside a persisted index bundle
pub const MANIFEST_FILE: &str = "manifest.json";
/// Corpus record texts, in id order
pub const RECORDS_FILE: &str = "records.json";
/// Serialized dense vector index
pub const DENSE_INDEX_FILE: &str = "dense.json";
/// Serialized BM25 index
pub const SPARSE_INDEX_FILE: &str = "bm25.json";

/// Metadata describing a persisted index bundle.
///
/// The corpus fingerprint ties the dense and sparse artifacts to one corpus
/// build; a bundle whose fingerprint does not match its records fails to
/// load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Embedding model name used at build time
    pub model_name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Number of records indexed
    pub num_records: usize,
    /// Build timestamp (RFC 3339)
    pub created_at: String,
    /// SHA-256 fingerprint of the corpus texts
    pub corpus_fingerprint: String,
}
