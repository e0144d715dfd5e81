//! Sparse lexical index
//!
//! Okapi BM25 over whitespace tokens. Tokenization is the same at build
//! and query time: whitespace split, no stemming, no stop words, no case
//! folding, so scores are sensitive to exact token surface form.

use crate::corpus::RecordId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// BM25 k1 parameter (term-frequency saturation)
pub const BM25_K1: f32 = 1.5;
/// BM25 b parameter (length normalization)
pub const BM25_B: f32 = 0.75;
/// Floor factor applied to negative IDF values
pub const BM25_EPSILON: f32 = 0.25;

/// Okapi BM25 inverted index.
///
/// Document count and average document length are frozen at build time;
/// the index is never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    /// Record ids, parallel to `doc_lengths`
    ids: Vec<RecordId>,
    /// Token count per document
    doc_lengths: Vec<usize>,
    /// Average document length at build time
    avgdl: f32,
    /// term -> [(position in `ids`, term frequency)]
    postings: HashMap<String, Vec<(usize, u32)>>,
    /// Precomputed IDF per term (with epsilon floor applied)
    idf: HashMap<String, f32>,
}

/// Whitespace tokenization shared by build and query time
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

impl Bm25Index {
    /// Build a BM25 index over `(id, text)` pairs.
    pub fn build(documents: &[(RecordId, &str)]) -> Result<Self> {
        if documents.is_empty() {
            anyhow::bail!("Cannot build a BM25 index from an empty corpus");
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut doc_lengths = Vec::with_capacity(documents.len());
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();

        for (pos, (id, text)) in documents.iter().enumerate() {
            let tokens = tokenize(text);
            ids.push(*id);
            doc_lengths.push(tokens.len());

            let mut term_freqs: HashMap<&str, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in term_freqs {
                postings.entry(term.to_string()).or_default().push((pos, tf));
            }
        }

        let total_len: usize = doc_lengths.iter().sum();
        let avgdl = total_len as f32 / doc_lengths.len() as f32;

        let idf = compute_idf(&postings, documents.len());

        tracing::debug!(
            "Built BM25 index: {} records, {} distinct terms, avgdl {:.1}",
            ids.len(),
            postings.len(),
            avgdl
        );

        Ok(Self {
            ids,
            doc_lengths,
            avgdl,
            postings,
            idf,
        })
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// BM25 score of the query against every record, in id-slot order.
    pub fn score_all(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.ids.len()];

        for term in tokenize(query) {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf.get(term).copied().unwrap_or(0.0);

            for &(pos, tf) in posting {
                let tf = tf as f32;
                let dl = self.doc_lengths[pos] as f32;
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / self.avgdl);
                scores[pos] += idf * tf * (BM25_K1 + 1.0) / denom;
            }
        }

        scores
    }

    /// Top-`n` records by descending BM25 score.
    ///
    /// Every record is scored; records with no query-token overlap score
    /// 0.0 and may still appear when `n` exceeds the number of matching
    /// records. Ties are broken by ascending record position.
    pub fn search(&self, query: &str, n: usize) -> Vec<(RecordId, f32)> {
        let scores = self.score_all(query);

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);

        ranked
            .into_iter()
            .map(|(pos, score)| (self.ids[pos], score))
            .collect()
    }
}

/// Okapi IDF with an epsilon correction: terms so common that their IDF
/// turns negative get `epsilon * average_idf` instead.
fn compute_idf(postings: &HashMap<String, Vec<(usize, u32)>>, doc_count: usize) -> HashMap<String, f32> {
    let n = doc_count as f32;
    let mut idf: HashMap<String, f32> = HashMap::new();
    let mut idf_sum = 0.0f32;
    let mut negative_terms: Vec<String> = Vec::new();

    for (term, posting) in postings {
        let df = posting.len() as f32;
        let value = ((n - df + 0.5) / (df + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative_terms.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    let average_idf = idf_sum / idf.len() as f32;
    let floor = BM25_EPSILON * average_idf;
    for term in negative_terms {
        idf.insert(term, floor);
    }

    idf
}
