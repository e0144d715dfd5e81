//! Corpus ingestion
//!
//! Loads processed medical QA data and turns each row into a flat text
//! record. Records get a surrogate id at ingestion; the id travels through
//! both indexes, the fusion map and the reranker, and is only resolved back
//! to text when the final context string is assembled.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Surrogate identifier for a corpus record, assigned at ingestion.
pub type RecordId = usize;

/// A single indexable text record.
///
/// The text is the concatenation of the topic label, question, answer, and
/// normalized semantic-type / synonym tags of one QA row. Immutable once
/// built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Surrogate id (position in the corpus)
    pub id: RecordId,
    /// Flat text content
    pub text: String,
}

/// One row of the processed corpus CSV.
///
/// Only `question` and `answer` are required; the remaining fields default
/// to empty strings when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRow {
    /// Topic label, e.g. the disease or health topic name
    #[serde(default)]
    pub focus: String,
    /// Question text
    #[serde(default)]
    pub question: String,
    /// Answer text
    #[serde(default)]
    pub answer: String,
    /// Pipe-separated semantic type tags
    #[serde(default)]
    pub semantic_types: String,
    /// Pipe-separated synonym tags
    #[serde(default)]
    pub synonyms: String,
}

impl SourceRow {
    /// Compose the flat record text from the row fields.
    ///
    /// Pipe separators in the tag fields are replaced with spaces so the
    /// tags tokenize like ordinary words.
    pub fn compose_text(&self) -> String {
        format!(
            "{}. {} {} {} {}",
            self.focus.trim(),
            self.question.trim(),
            self.answer.trim(),
            self.semantic_types.replace('|', " "),
            self.synonyms.replace('|', " "),
        )
    }

    /// Rows without a question or answer carry no indexable content.
    pub fn is_complete(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// Immutable collection of records with stable surrogate identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStore {
    records: Vec<Record>,
}

impl CorpusStore {
    /// Build a corpus from pre-composed texts.
    ///
    /// Texts that are identical after trimming collapse to a single record
    /// (first occurrence wins); empty texts are dropped.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for text in texts {
            let text: String = text.into();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !seen.insert(trimmed.to_string()) {
                continue;
            }
            records.push(Record {
                id: records.len(),
                text: trimmed.to_string(),
            });
        }

        Self { records }
    }

    /// Load the corpus from a processed CSV file with columns
    /// `focus,question,answer,semantic_types,synonyms`.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading corpus from {:?}", path);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .context(format!("Failed to open corpus CSV: {:?}", path))?;

        let mut texts = Vec::new();
        let mut dropped = 0usize;

        for row in reader.deserialize::<SourceRow>() {
            let row = row.context("Failed to parse corpus CSV row")?;
            if !row.is_complete() {
                dropped += 1;
                continue;
            }
            texts.push(row.compose_text());
        }

        if dropped > 0 {
            tracing::warn!("Dropped {} rows with missing question or answer", dropped);
        }

        let store = Self::from_texts(texts);
        tracing::info!("Loaded {} corpus records", store.len());
        Ok(store)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the corpus holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in id order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Resolve a record id to its text.
    pub fn text(&self, id: RecordId) -> Option<&str> {
        self.records.get(id).map(|r| r.text.as_str())
    }

    /// All record texts in id order.
    pub fn texts(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.text.as_str()).collect()
    }

    /// SHA-256 fingerprint over all record texts in id order.
    ///
    /// The fingerprint is stored in the index manifest and re-checked at
    /// load time so the dense and sparse artifacts can never come from
    /// different corpus builds.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.text.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compose_text() {
        let row = SourceRow {
            focus: "Influenza".to_string(),
            question: "What is flu?".to_string(),
            answer: "A viral infection.".to_string(),
            semantic_types: "T047|T046".to_string(),
            synonyms: "grippe|the flu".to_string(),
        };

        let text = row.compose_text();
        assert_eq!(text, "Influenza. What is flu? A viral infection. T047 T046 grippe the flu");
    }

    #[test]
    fn test_incomplete_rows_are_detected() {
        let row = SourceRow {
            question: "What is flu?".to_string(),
            ..Default::default()
        };
        assert!(!row.is_complete());

        let row = SourceRow {
            question: "q".to_string(),
            answer: "a".to_string(),
            ..Default::default()
        };
        assert!(row.is_complete());
    }

    #[test]
    fn test_duplicate_texts_collapse() {
        let store = CorpusStore::from_texts(vec!["alpha", "beta", "alpha", "  beta  "]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.text(0), Some("alpha"));
        assert_eq!(store.text(1), Some("beta"));
    }

    #[test]
    fn test_empty_texts_dropped() {
        let store = CorpusStore::from_texts(vec!["", "   ", "real"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fingerprint_is_order_and_content_sensitive() {
        let a = CorpusStore::from_texts(vec!["one", "two"]);
        let b = CorpusStore::from_texts(vec!["one", "two"]);
        let c = CorpusStore::from_texts(vec!["two", "one"]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "focus,question,answer,semantic_types,synonyms").unwrap();
        writeln!(file, "Flu,What is flu?,A viral infection.,T047,grippe").unwrap();
        writeln!(file, "Flu,,missing question,T047,grippe").unwrap();
        file.flush().unwrap();

        let store = CorpusStore::from_csv(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.text(0).unwrap().starts_with("Flu. What is flu?"));
    }
}
