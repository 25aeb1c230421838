//! Provider trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Token counting trait, possibly backed by a remote service
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Count tokens in a single text
    async fn count_tokens(&self, text: &str) -> Result<usize>;

    /// Count tokens for a batch of texts in one round-trip
    async fn count_tokens_batch(&self, texts: &[String]) -> Result<Vec<usize>> {
        let mut counts = Vec::with_capacity(texts.len());
        for text in texts {
            counts.push(self.count_tokens(text).await?);
        }
        Ok(counts)
    }
}

/// Cross-encoder reranking trait
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank candidate texts for a query; returns (input index, relevance)
    /// pairs, best first
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<RerankEntry>>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// One reranked document
#[derive(Debug, Clone, PartialEq)]
pub struct RerankEntry {
    /// Index into the input text slice
    pub index: usize,
    pub relevance_score: f64,
}
