//! Error types for codescout

use thiserror::Error;

/// Result type alias using CodeScoutError
pub type Result<T> = std::result::Result<T, CodeScoutError>;

/// Error type alias for convenience
pub type Error = CodeScoutError;

/// Main error type for codescout
#[derive(Debug, Error)]
pub enum CodeScoutError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Rate limited by provider (HTTP 429): {0}")]
    RateLimited(String),

    #[error("Rate limit retries exhausted after {retries} attempts")]
    RateLimitExhausted { retries: u32 },

    #[error("Request queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Chunk store key not configured")]
    StoreKeyMissing,

    #[error("Chunk store authentication failed: {0}")]
    StoreAuthFailed(String),

    #[error("Chunk store format unrecognized: {0}")]
    StoreFormatUnrecognized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CodeScoutError {
    /// True for provider rate-limit responses that are worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// True for errors a search pipeline may degrade on instead of failing.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::ExternalError(_) | Self::RateLimited(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_classification() {
        let err = CodeScoutError::RateLimited("slow down".to_string());
        assert!(err.is_rate_limited());
        assert!(err.is_degradable());

        let err = CodeScoutError::Parse("bad tree".to_string());
        assert!(!err.is_rate_limited());
        assert!(!err.is_degradable());
    }

    #[test]
    fn test_store_errors_are_distinct() {
        let missing = CodeScoutError::StoreKeyMissing.to_string();
        let auth = CodeScoutError::StoreAuthFailed("tag mismatch".to_string()).to_string();
        let format = CodeScoutError::StoreFormatUnrecognized("v9".to_string()).to_string();
        assert_ne!(missing, auth);
        assert_ne!(auth, format);
    }
}
