//! # MedSage
//!
//! A hybrid retrieval engine for medical question answering.
//!
//! ## Overview
//!
//! MedSage ingests a corpus of medical question/answer records and builds two
//! complementary indexes over it:
//!
//! - A dense vector index over sentence embeddings (semantic similarity)
//! - A sparse BM25 index over whitespace tokens (lexical overlap)
//!
//! At query time both indexes are searched, their rankings are combined with
//! Reciprocal Rank Fusion, and a cross-encoder reranks the fused shortlist
//! before the top documents are joined into one context string for the caller.
//!
//! ## Architecture
//!
//! The crate is organized into modular components:
//!
//! - `corpus` - Record ingestion from processed CSV data
//! - `embedding` - Embedding generation with pluggable backends
//! - `index` - Index builder, dense vector index, BM25 index, persistence
//! - `retrieval` - Rank fusion, reranking, and the hybrid retriever facade
//! - `evaluation` - Hit Rate@K / MRR@K measurement with a semantic judge
//! - `cli` - Command-line interface

pub mod corpus;
pub mod embedding;
pub mod index;
pub mod retrieval;
pub mod evaluation;
pub mod cli;

// Re-export commonly used types
pub use anyhow::{Error, Result};
