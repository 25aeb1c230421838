//! Core data contract shared by the chunker, the indexing engine and search
//!
//! A chunk's `sha` is a pure function of its source text; the composite
//! `chunk_id` adds the file path and extracted symbol so two identical
//! snippets in different places stay distinct entries in the codemap.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Kind of retrieval unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    /// Whole-file fallback when AST parsing fails
    File,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::File => "file",
        }
    }
}

impl Default for ChunkKind {
    fn default() -> Self {
        Self::Function
    }
}

/// Persisted per-chunk metadata, the codemap record.
///
/// Unknown top-level fields written by newer versions are kept in `extra`
/// and round-trip verbatim; the schema is additive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    /// Full SHA-256 of the chunk source text; on-disk blob key and dedup key
    pub sha: String,
    pub file_path: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    pub chunk_kind: ChunkKind,
    /// Size in provider units, as measured at indexing time
    #[serde(default)]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub important_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Raw textual call-site names recorded by metadata extraction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    /// Resolved outgoing edges, chunk-sha references (symbol graph pass)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_targets: Vec<String>,
    /// Incoming edges, chunk-sha references (symbol graph pass)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callers: Vec<String>,
    /// Union of call targets and callers, capped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<String>,
    /// Parent declaration context for subdivided members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_context: Option<String>,
    /// Forward-compatible fields from other writers
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkRecord {
    /// Short description suitable for lexical indexing and rerank payloads
    pub fn description(&self) -> String {
        self.intent
            .clone()
            .or_else(|| {
                self.doc_comment
                    .as_ref()
                    .and_then(|d| d.lines().next().map(|l| l.trim().to_string()))
            })
            .unwrap_or_default()
    }
}

/// Full SHA-256 hex of the chunk source text
pub fn chunk_sha(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Composite chunk identity: relative path, symbol, 8-hex hash prefix
pub fn chunk_id(file_path: &str, symbol: &str, sha: &str) -> String {
    format!("{}:{}:{}", file_path, symbol, &sha[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha_is_pure_function_of_text() {
        let a = chunk_sha("fn parse() {}");
        let b = chunk_sha("fn parse() {}");
        let c = chunk_sha("fn parse() { }");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_chunk_id_shape() {
        let sha = chunk_sha("fn parse() {}");
        let id = chunk_id("src/config.rs", "parse", &sha);
        assert!(id.starts_with("src/config.rs:parse:"));
        assert_eq!(id.rsplit(':').next().unwrap().len(), 8);
    }

    #[test]
    fn test_record_round_trips_unknown_fields() {
        let json = r#"{
            "chunk_id": "a.rs:foo:12345678",
            "sha": "abc",
            "file_path": "a.rs",
            "symbol": "foo",
            "chunk_kind": "function",
            "future_field": {"nested": true}
        }"#;
        let record: ChunkRecord = serde_json::from_str(json).unwrap();
        assert!(record.extra.contains_key("future_field"));

        let out = serde_json::to_string(&record).unwrap();
        assert!(out.contains("future_field"));
        assert!(out.contains("nested"));
    }

    #[test]
    fn test_description_prefers_intent() {
        let record = ChunkRecord {
            intent: Some("parses the config".to_string()),
            doc_comment: Some("/// Reads a file".to_string()),
            ..Default::default()
        };
        assert_eq!(record.description(), "parses the config");
    }
}
