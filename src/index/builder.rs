//! Index builder and bundle persistence
//!
//! Offline batch job: consumes a corpus store, produces the dense and
//! sparse indexes, and persists them as one bundle. Persistence is
//! all-or-nothing: artifacts are written to a staging directory that is
//! swapped into place only after every file is on disk, so a failed build
//! never leaves a partially written bundle behind.

use crate::corpus::{CorpusStore, RecordId};
use crate::embedding::Embedder;
use crate::index::{
    Bm25Index, DenseIndex, IndexManifest, DENSE_INDEX_FILE, MANIFEST_FILE, RECORDS_FILE,
    SPARSE_INDEX_FILE,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Builds both retrieval indexes from one corpus
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
}

/// A fully built (or loaded) index bundle
#[derive(Debug)]
pub struct IndexBundle {
    /// Corpus records, id order
    pub corpus: CorpusStore,
    /// Dense vector index
    pub dense: DenseIndex,
    /// Sparse BM25 index
    pub sparse: Bm25Index,
    /// Bundle metadata
    pub manifest: IndexManifest,
}

impl IndexBuilder {
    /// Create a builder around an embedding model
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Build the dense and sparse indexes from a corpus.
    ///
    /// Fails fast on an empty corpus; an embedding failure aborts the
    /// whole build so no partial index can be produced.
    pub fn build(&self, corpus: &CorpusStore) -> Result<(DenseIndex, Bm25Index)> {
        if corpus.is_empty() {
            anyhow::bail!("Cannot build indexes from an empty corpus");
        }

        tracing::info!("Building indexes over {} records", corpus.len());

        let texts = corpus.texts();
        let ids: Vec<RecordId> = corpus.records().iter().map(|r| r.id).collect();

        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .context("Embedding model failed; aborting index build")?;
        let dense = DenseIndex::build(ids.clone(), embeddings)?;

        let documents: Vec<(RecordId, &str)> =
            ids.iter().copied().zip(texts.iter().copied()).collect();
        let sparse = Bm25Index::build(&documents)?;

        tracing::info!(
            "Indexes built: dense dimension {}, {} records",
            dense.dimension(),
            dense.len()
        );

        Ok((dense, sparse))
    }

    /// Build both indexes and persist the bundle under `dir`.
    ///
    /// A rebuild replaces any previous bundle entirely.
    pub fn build_and_persist(&self, corpus: &CorpusStore, dir: &Path) -> Result<IndexManifest> {
        let (dense, sparse) = self.build(corpus)?;

        let manifest = IndexManifest {
            model_name: self.embedder.model_name().to_string(),
            dimension: dense.dimension(),
            num_records: corpus.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
            corpus_fingerprint: corpus.fingerprint(),
        };

        persist_bundle(dir, corpus, &dense, &sparse, &manifest)?;
        Ok(manifest)
    }
}

fn persist_bundle(
    dir: &Path,
    corpus: &CorpusStore,
    dense: &DenseIndex,
    sparse: &Bm25Index,
    manifest: &IndexManifest,
) -> Result<()> {
    let staging = dir.with_extension("staging");
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .context(format!("Failed to clear stale staging directory {:?}", staging))?;
    }
    fs::create_dir_all(&staging)
        .context(format!("Failed to create staging directory {:?}", staging))?;

    let texts: Vec<&str> = corpus.texts();
    write_json(&staging.join(RECORDS_FILE), &texts)?;
    write_json(&staging.join(DENSE_INDEX_FILE), dense)?;
    write_json(&staging.join(SPARSE_INDEX_FILE), sparse)?;
    write_json(&staging.join(MANIFEST_FILE), manifest)?;

    // Swap the finished bundle into place
    if dir.exists() {
        fs::remove_dir_all(dir).context(format!("Failed to remove previous bundle {:?}", dir))?;
    }
    fs::rename(&staging, dir)
        .context(format!("Failed to move staged bundle into {:?}", dir))?;

    tracing::info!("Index bundle persisted to {:?}", dir);
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    fs::write(path, json).context(format!("Failed to write {:?}", path))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).context(format!("Missing index artifact {:?}", path))?;
    serde_json::from_str(&json).context(format!("Failed to parse index artifact {:?}", path))
}

/// Load a persisted index bundle.
///
/// Missing artifacts, a corpus-fingerprint mismatch, or an embedder whose
/// dimensionality differs from the build-time model are all fatal: the
/// caller must refuse to serve rather than degrade to one retrieval path.
pub fn load_bundle(dir: &Path, embedder: &dyn Embedder) -> Result<IndexBundle> {
    tracing::info!("Loading index bundle from {:?}", dir);

    let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE))?;
    let texts: Vec<String> = read_json(&dir.join(RECORDS_FILE))?;
    let dense: DenseIndex = read_json(&dir.join(DENSE_INDEX_FILE))?;
    let sparse: Bm25Index = read_json(&dir.join(SPARSE_INDEX_FILE))?;

    let corpus = CorpusStore::from_texts(texts);

    if corpus.fingerprint() != manifest.corpus_fingerprint {
        anyhow::bail!(
            "Corpus fingerprint mismatch in {:?}: the bundle artifacts do not come from the same build",
            dir
        );
    }
    if corpus.len() != manifest.num_records
        || dense.len() != manifest.num_records
        || sparse.len() != manifest.num_records
    {
        anyhow::bail!(
            "Record count mismatch in {:?}: manifest says {}, artifacts disagree",
            dir,
            manifest.num_records
        );
    }
    if embedder.dimension() != manifest.dimension {
        anyhow::bail!(
            "Embedding dimension mismatch: index was built with dimension {}, embedder produces {}",
            manifest.dimension,
            embedder.dimension()
        );
    }
    if embedder.model_name() != manifest.model_name {
        tracing::warn!(
            "Embedder model mismatch: index={}, embedder={}",
            manifest.model_name,
            embedder.model_name()
        );
    }

    tracing::info!("Index bundle loaded: {} records", corpus.len());

    Ok(IndexBundle {
        corpus,
        dense,
        sparse,
        manifest,
    })
}
