//! Hybrid ranking over indexed chunks
//!
//! Vector similarity is the base signal; BM25 rank fusion, symbol-graph
//! boosts and an optional external reranker layer on top. Every stage
//! records its contribution on the candidate so callers can see which
//! signals fired.

pub mod bm25;
pub mod hybrid;
pub mod symbol_boost;
pub mod telemetry;
pub mod vector;

pub use bm25::Bm25Index;
pub use hybrid::{SearchService, RRF_K};
pub use symbol_boost::BoostSource;

use crate::config::SearchDefaults;
use crate::model::ChunkRecord;

/// Options for one query
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Glob applied to chunk file paths
    pub path_glob: Option<String>,
    /// Require every listed tag
    pub tags: Vec<String>,
    pub lang: Option<String>,
    pub hybrid: bool,
    pub bm25: bool,
    pub symbol_boost: bool,
    pub rerank: bool,
    /// Drop results scoring below this
    pub min_score: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_defaults(&SearchDefaults::default())
    }
}

impl SearchOptions {
    pub fn from_defaults(defaults: &SearchDefaults) -> Self {
        Self {
            limit: 10,
            path_glob: None,
            tags: Vec::new(),
            lang: None,
            hybrid: defaults.hybrid,
            bm25: defaults.bm25,
            symbol_boost: defaults.symbol_boost,
            rerank: defaults.rerank,
            min_score: 0.0,
        }
    }
}

/// One scored chunk, enriched stage by stage
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub record: ChunkRecord,
    /// Cosine similarity plus heuristic boosts, clamped to [0, 1]
    pub raw_score: f64,
    pub bm25_score: Option<f64>,
    pub bm25_rank: Option<usize>,
    pub hybrid_score: Option<f64>,
    pub hybrid_rank: Option<usize>,
    pub symbol_boost: f64,
    pub boost_sources: Vec<BoostSource>,
    pub rerank_score: Option<f64>,
    pub rerank_rank: Option<usize>,
    /// Final score used for ordering, clamped to [0, 1]
    pub score: f64,
}

impl SearchCandidate {
    pub fn new(record: ChunkRecord, raw_score: f64) -> Self {
        Self {
            record,
            raw_score,
            bm25_score: None,
            bm25_rank: None,
            hybrid_score: None,
            hybrid_rank: None,
            symbol_boost: 0.0,
            boost_sources: Vec::new(),
            rerank_score: None,
            rerank_rank: None,
            score: raw_score,
        }
    }
}

/// Lowercase, trim, collapse whitespace, strip query punctuation
pub fn normalize_query(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| match c {
            '?' | '!' | '"' | '\'' | ';' | ',' => ' ',
            other => other,
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scope filter used before any scoring
pub fn in_scope(record: &ChunkRecord, options: &SearchOptions) -> bool {
    if let Some(glob) = &options.path_glob {
        match glob::Pattern::new(glob) {
            Ok(pattern) => {
                if !pattern.matches(&record.file_path) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
    if let Some(lang) = &options.lang {
        if record.lang.as_deref() != Some(lang.as_str()) {
            return false;
        }
    }
    options.tags.iter().all(|tag| record.tags.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(
            normalize_query("  How do I Parse   config?! "),
            "how do i parse config"
        );
        assert_eq!(normalize_query("send_email"), "send_email");
    }

    proptest::proptest! {
        #[test]
        fn normalize_query_is_idempotent(query in ".{0,120}") {
            let once = normalize_query(&query);
            proptest::prop_assert_eq!(normalize_query(&once), once.clone());
            proptest::prop_assert!(!once.contains("  "));
            proptest::prop_assert_eq!(once.clone(), once.to_lowercase());
        }
    }

    #[test]
    fn test_scope_filters() {
        let record = ChunkRecord {
            file_path: "src/auth/login.rs".to_string(),
            lang: Some("rust".to_string()),
            tags: vec!["rust".to_string(), "async".to_string()],
            ..Default::default()
        };

        let mut options = SearchOptions::default();
        assert!(in_scope(&record, &options));

        options.path_glob = Some("src/auth/**".to_string());
        assert!(in_scope(&record, &options));
        options.path_glob = Some("tests/**".to_string());
        assert!(!in_scope(&record, &options));
        options.path_glob = None;

        options.lang = Some("python".to_string());
        assert!(!in_scope(&record, &options));
        options.lang = Some("rust".to_string());
        options.tags = vec!["async".to_string()];
        assert!(in_scope(&record, &options));
        options.tags = vec!["deprecated".to_string()];
        assert!(!in_scope(&record, &options));
    }
}
