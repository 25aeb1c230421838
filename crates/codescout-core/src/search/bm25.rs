//! In-memory BM25 lexical index
//!
//! Built lazily over `symbol + file_path + description + intent + code`
//! and updated incrementally: documents already present are skipped, so
//! the index survives across queries and only pays for new chunks.

use std::collections::{HashMap, HashSet};

const K1: f64 = 1.2;
const B: f64 = 0.75;
const MIN_TOKEN_LEN: usize = 2;

struct Doc {
    term_counts: HashMap<String, usize>,
    len: usize,
}

/// Incremental BM25 index keyed by chunk id
#[derive(Default)]
pub struct Bm25Index {
    docs: HashMap<String, Doc>,
    doc_freq: HashMap<String, usize>,
    total_len: usize,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.docs.contains_key(chunk_id)
    }

    /// Add a document; adding an already-indexed chunk id is a no-op
    pub fn add_document(&mut self, chunk_id: &str, text: &str) {
        if self.docs.contains_key(chunk_id) {
            return;
        }
        let tokens = tokenize(text);
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_len += tokens.len();
        self.docs.insert(
            chunk_id.to_string(),
            Doc {
                term_counts,
                len: tokens.len(),
            },
        );
    }

    pub fn remove_document(&mut self, chunk_id: &str) {
        if let Some(doc) = self.docs.remove(chunk_id) {
            self.total_len -= doc.len;
            for term in doc.term_counts.keys() {
                if let Some(df) = self.doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freq.remove(term);
                    }
                }
            }
        }
    }

    /// Score all documents for a query, best first, up to `limit`
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)> {
        if self.docs.is_empty() {
            return Vec::new();
        }
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f64;
        let avg_len = self.total_len as f64 / n;

        let mut scores: Vec<(String, f64)> = Vec::new();
        for (chunk_id, doc) in &self.docs {
            let mut score = 0.0;
            for term in &terms {
                let Some(&tf) = doc.term_counts.get(term) else {
                    continue;
                };
                let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let tf = tf as f64;
                let norm = tf * (K1 + 1.0)
                    / (tf + K1 * (1.0 - B + B * doc.len as f64 / avg_len.max(1.0)));
                score += idf * norm;
            }
            if score > 0.0 {
                scores.push((chunk_id.clone(), score));
            }
        }

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(limit);
        scores
    }
}

/// Lowercased alphanumeric/underscore runs, short tokens dropped
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}
