use anyhow::Result;
use clap::{Parser, Subcommand};
use medsage::cli::{self, ModelOptions};
use medsage::evaluation::{DEFAULT_K, DEFAULT_SIM_THRESHOLD};
use medsage::retrieval::SearchConfig;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "medsage")]
#[command(about = "Hybrid retrieval engine for medical question answering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Embedding backend (token, hash, onnx)
    #[arg(long, global = true, default_value = "token")]
    embedding_backend: String,

    /// Embedding dimension
    #[arg(long, global = true, default_value_t = 384)]
    dimension: usize,

    /// Reranker backend (overlap, onnx)
    #[arg(long, global = true, default_value = "overlap")]
    reranker_backend: String,

    /// Directory with ONNX model files (model.onnx + tokenizer.json)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index bundle from a processed corpus CSV
    BuildIndex {
        /// Path to the processed corpus CSV
        #[arg(short, long)]
        corpus: PathBuf,

        /// Directory for the persisted index bundle
        #[arg(short, long, default_value = "index")]
        index_dir: PathBuf,
    },
    /// Run one hybrid query against a persisted index
    Search {
        /// Query text
        query: String,

        /// Directory of the persisted index bundle
        #[arg(short, long, default_value = "index")]
        index_dir: PathBuf,

        /// Candidates fetched from each retrieval path
        #[arg(long, default_value_t = 50)]
        retrieve_depth: usize,

        /// Fused candidates passed to the reranker
        #[arg(long, default_value_t = 25)]
        rerank_depth: usize,

        /// Documents in the final context
        #[arg(long, default_value_t = 5)]
        final_depth: usize,
    },
    /// Evaluate retrieval quality over a gold-query CSV
    Eval {
        /// Path to the evaluation CSV (query + relevant_doc_N columns)
        #[arg(short, long)]
        eval_csv: PathBuf,

        /// Directory of the persisted index bundle
        #[arg(short, long, default_value = "index")]
        index_dir: PathBuf,

        /// Top-K cutoff for Hit Rate and MRR
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: usize,

        /// Cosine-similarity threshold for the semantic judge
        #[arg(long, default_value_t = DEFAULT_SIM_THRESHOLD)]
        threshold: f32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medsage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let models = ModelOptions {
        embedding_backend: cli.embedding_backend,
        dimension: cli.dimension,
        reranker_backend: cli.reranker_backend,
        model_dir: cli.model_dir,
    };

    match cli.command {
        Commands::BuildIndex { corpus, index_dir } => {
            cli::build_index(&corpus, &index_dir, &models)
        }
        Commands::Search {
            query,
            index_dir,
            retrieve_depth,
            rerank_depth,
            final_depth,
        } => {
            let config = SearchConfig {
                retrieve_depth,
                rerank_depth,
                final_depth,
                ..SearchConfig::default()
            };
            cli::search(&index_dir, &query, &models, config)
        }
        Commands::Eval {
            eval_csv,
            index_dir,
            k,
            threshold,
        } => cli::eval(&index_dir, &eval_csv, &models, k, threshold),
    }
}
