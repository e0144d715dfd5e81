//! CLI command implementations
//!
//! Each subcommand body lives here so `main.rs` stays a thin argument
//! parser. Commands print human-readable output and log progress through
//! `tracing`.

use crate::corpus::CorpusStore;
use crate::embedding::{create_embedder, Embedder, EmbeddingConfig};
use crate::evaluation::{load_eval_csv, Evaluator};
use crate::index::IndexBuilder;
use crate::retrieval::{create_reranker, HybridRetriever, Reranker, SearchConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options shared by every command that instantiates models
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Embedding backend name (`token`, `hash`, or `onnx`)
    pub embedding_backend: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Reranker backend name (`overlap` or `onnx`)
    pub reranker_backend: String,
    /// Directory holding ONNX model files (required by the onnx backends)
    pub model_dir: Option<PathBuf>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            embedding_backend: "token".to_string(),
            dimension: 384,
            reranker_backend: "overlap".to_string(),
            model_dir: None,
        }
    }
}

/// Instantiate the embedding model for `models`.
///
/// The `onnx` backend loads a real model from `--model-dir`; the other
/// backends go through the factory.
pub fn build_embedder(models: &ModelOptions) -> Result<Arc<dyn Embedder>> {
    if models.embedding_backend == "onnx" {
        #[cfg(feature = "onnx")]
        {
            let dir = models
                .model_dir
                .as_deref()
                .context("--model-dir is required with the onnx embedding backend")?;
            let embedder = crate::embedding::OnnxEmbedder::new(
                dir,
                EmbeddingConfig::default(),
                models.dimension,
            )?;
            return Ok(Arc::new(embedder));
        }
        #[cfg(not(feature = "onnx"))]
        anyhow::bail!("This build does not include the onnx feature");
    }
    create_embedder(
        &models.embedding_backend,
        EmbeddingConfig::default(),
        models.dimension,
    )
}

/// Instantiate the reranker for `models`, mirroring [`build_embedder`].
pub fn build_reranker(models: &ModelOptions) -> Result<Arc<dyn Reranker>> {
    if models.reranker_backend == "onnx" {
        #[cfg(feature = "onnx")]
        {
            let dir = models
                .model_dir
                .as_deref()
                .context("--model-dir is required with the onnx reranker backend")?;
            let reranker =
                crate::retrieval::CrossEncoderReranker::new(dir, "cross-encoder", 512)?;
            return Ok(Arc::new(reranker));
        }
        #[cfg(not(feature = "onnx"))]
        anyhow::bail!("This build does not include the onnx feature");
    }
    create_reranker(&models.reranker_backend)
}

/// Ingest a source CSV and persist a fresh index bundle
pub fn build_index(csv_path: &Path, index_dir: &Path, models: &ModelOptions) -> Result<()> {
    let corpus = CorpusStore::from_csv(csv_path)
        .context(format!("Failed to load corpus from {:?}", csv_path))?;
    tracing::info!("Corpus loaded: {} records", corpus.len());

    let embedder = build_embedder(models)?;

    let builder = IndexBuilder::new(embedder);
    let manifest = builder.build_and_persist(&corpus, index_dir)?;

    println!("Index built: {} records", manifest.num_records);
    println!("  Model: {} (dimension {})", manifest.model_name, manifest.dimension);
    println!("  Location: {}", index_dir.display());
    Ok(())
}

/// Run one hybrid query against a persisted index and print the context
pub fn search(
    index_dir: &Path,
    query: &str,
    models: &ModelOptions,
    config: SearchConfig,
) -> Result<()> {
    let retriever = load_retriever(index_dir, models, config)?;

    let context = retriever.search(query)?;
    if context.is_empty() {
        println!("No relevant information found.");
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// Evaluate retrieval quality over a gold-query CSV and print the summary
pub fn eval(
    index_dir: &Path,
    eval_csv: &Path,
    models: &ModelOptions,
    k: usize,
    threshold: f32,
) -> Result<()> {
    // One embedder serves both the retriever and the semantic judge
    let embedder = build_embedder(models)?;
    let reranker = build_reranker(models)?;
    let retriever = HybridRetriever::load(
        index_dir,
        Arc::clone(&embedder),
        reranker,
        SearchConfig::default(),
    )?;
    let queries = load_eval_csv(eval_csv)?;

    let evaluator = Evaluator::new(embedder, k, threshold);

    let summary = evaluator.evaluate(&retriever, &queries)?;
    print!("{}", summary);
    Ok(())
}

fn load_retriever(
    index_dir: &Path,
    models: &ModelOptions,
    config: SearchConfig,
) -> Result<HybridRetriever> {
    let embedder = build_embedder(models)?;
    let reranker = build_reranker(models)?;
    HybridRetriever::load(index_dir, embedder, reranker, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source_csv(file: &mut tempfile::NamedTempFile) {
        writeln!(file, "focus,question,answer,semantic_types,synonyms").unwrap();
        writeln!(
            file,
            "Angina,What causes chest pain?,Chest pain may indicate cardiac issues,T047,angina pectoris"
        )
        .unwrap();
        writeln!(
            file,
            "Influenza,What are flu symptoms?,Fever and cough are symptoms of flu,T047,grippe"
        )
        .unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn test_build_index_then_search() {
        let mut csv = tempfile::NamedTempFile::new().unwrap();
        write_source_csv(&mut csv);

        let temp = tempfile::tempdir().unwrap();
        let index_dir = temp.path().join("index");
        let models = ModelOptions::default();

        build_index(csv.path(), &index_dir, &models).unwrap();
        assert!(index_dir.join(crate::index::MANIFEST_FILE).exists());

        search(&index_dir, "chest pain", &models, SearchConfig::default()).unwrap();
    }

    #[test]
    fn test_search_without_index_fails() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("no-such-index");

        let err = search(
            &missing,
            "anything",
            &ModelOptions::default(),
            SearchConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("refusing to start"));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_backend_errors_without_feature() {
        let models = ModelOptions {
            embedding_backend: "onnx".to_string(),
            ..ModelOptions::default()
        };
        let err = build_embedder(&models).err().unwrap();
        assert!(err.to_string().contains("onnx feature"));

        let models = ModelOptions {
            reranker_backend: "onnx".to_string(),
            ..ModelOptions::default()
        };
        let err = build_reranker(&models).err().unwrap();
        assert!(err.to_string().contains("onnx feature"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_onnx_backend_requires_model_dir() {
        let models = ModelOptions {
            embedding_backend: "onnx".to_string(),
            reranker_backend: "onnx".to_string(),
            ..ModelOptions::default()
        };
        let err = build_embedder(&models).unwrap_err();
        assert!(err.to_string().contains("--model-dir"));

        let err = build_reranker(&models).unwrap_err();
        assert!(err.to_string().contains("--model-dir"));
    }

    #[test]
    fn test_eval_end_to_end() {
        let mut csv = tempfile::NamedTempFile::new().unwrap();
        write_source_csv(&mut csv);

        let temp = tempfile::tempdir().unwrap();
        let index_dir = temp.path().join("index");
        let models = ModelOptions::default();
        build_index(csv.path(), &index_dir, &models).unwrap();

        let mut eval_csv = tempfile::NamedTempFile::new().unwrap();
        writeln!(eval_csv, "query,relevant_doc_1").unwrap();
        writeln!(
            eval_csv,
            "what causes chest pain,Angina. What causes chest pain? Chest pain may indicate cardiac issues T047 angina pectoris"
        )
        .unwrap();
        eval_csv.flush().unwrap();

        eval(&index_dir, eval_csv.path(), &models, 10, 0.85).unwrap();
    }
}
