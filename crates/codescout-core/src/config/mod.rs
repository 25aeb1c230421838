//! Configuration management

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chunk size limits in embedding-provider units
    #[serde(default)]
    pub chunking: ChunkLimits,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingServiceConfig,

    /// Optional reranker service configuration
    #[serde(default)]
    pub reranker: Option<RerankServiceConfig>,

    /// Default search feature flags
    #[serde(default)]
    pub search: SearchDefaults,

    /// Data directory override (codemap, tracker tree, chunk store, database)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the data directory, falling back to the user cache dir
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::DATA_DIR_NAME)
        })
    }
}

/// Size limits for semantic chunking, in the provider's size unit
/// (tokens when a tokenizer is available, estimated tokens otherwise).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkLimits {
    /// Below this a chunk is too small to stand alone
    #[serde(default = "default_min")]
    pub min: usize,
    /// Preferred chunk size
    #[serde(default = "default_optimal")]
    pub optimal: usize,
    /// Above this a chunk must be subdivided
    #[serde(default = "default_max")]
    pub max: usize,
    /// Overlap ratio for statement-level slicing; a hard floor of 0.20
    /// is applied regardless of this value
    #[serde(default = "default_overlap")]
    pub overlap_ratio: f64,
    /// Minimum member count that forces merging of under-min leftovers
    #[serde(default = "default_merge_members")]
    pub merge_min_members: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            min: default_min(),
            optimal: default_optimal(),
            max: default_max(),
            overlap_ratio: default_overlap(),
            merge_min_members: default_merge_members(),
        }
    }
}

fn default_min() -> usize {
    64
}

fn default_optimal() -> usize {
    512
}

fn default_max() -> usize {
    1024
}

fn default_overlap() -> f64 {
    0.2
}

fn default_merge_members() -> usize {
    3
}

/// Embedding service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingServiceConfig {
    /// Base URL of the embeddings service
    pub url: String,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Optional tokenize endpoint URL (falls back to `{url}/tokenize`)
    #[serde(default)]
    pub tokenize_url: Option<String>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Rate limiting applied to embedding calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("CODESCOUT_EMBEDDING_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: std::env::var("CODESCOUT_EMBEDDING_MODEL")
                .unwrap_or_else(|_| default_embedding_model()),
            dimensions: std::env::var("CODESCOUT_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_dimensions),
            tokenize_url: None,
            api_key: std::env::var("CODESCOUT_EMBEDDING_API_KEY").ok(),
            timeout_secs: default_timeout(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Reranker service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankServiceConfig {
    /// Base URL of the rerank service
    pub url: String,

    /// Model name for reranking
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// API key (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Provider rate limiting configuration; both windows are optional
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per minute
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Maximum tokens per minute
    #[serde(default)]
    pub tokens_per_minute: Option<u32>,

    /// Maximum callers waiting for capacity before `QueueFull`
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    /// Retries on provider rate-limit responses before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: None,
            tokens_per_minute: None,
            max_queue: default_max_queue(),
            max_retries: default_max_retries(),
        }
    }
}

/// Default feature flags for the search pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchDefaults {
    #[serde(default = "default_true")]
    pub hybrid: bool,
    #[serde(default = "default_true")]
    pub bm25: bool,
    #[serde(default = "default_true")]
    pub symbol_boost: bool,
    #[serde(default)]
    pub rerank: bool,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            hybrid: true,
            bm25: true,
            symbol_boost: true,
            rerank: false,
        }
    }
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_rerank_model() -> String {
    "bge-reranker-base".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_timeout() -> u64 {
    60
}

fn default_max_queue() -> usize {
    256
}

fn default_max_retries() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_limits_defaults() {
        let limits = ChunkLimits::default();
        assert!(limits.min < limits.optimal);
        assert!(limits.optimal < limits.max);
        assert!((limits.overlap_ratio - 0.2).abs() < f64::EPSILON);
        assert_eq!(limits.merge_min_members, 3);
    }

    #[test]
    fn test_yaml_round_trip_with_partial_fields() {
        let yaml = r#"
chunking:
  max: 2048
embedding:
  url: "http://localhost:9000"
  model: "custom-embed"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.chunking.max, 2048);
        assert_eq!(config.chunking.optimal, 512);
        assert_eq!(config.embedding.model, "custom-embed");
        assert!(config.reranker.is_none());
    }

    #[test]
    fn test_search_defaults() {
        let defaults = SearchDefaults::default();
        assert!(defaults.hybrid);
        assert!(defaults.bm25);
        assert!(defaults.symbol_boost);
        assert!(!defaults.rerank);
    }
}
