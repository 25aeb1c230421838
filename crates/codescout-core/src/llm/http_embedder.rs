//! OpenAI-compatible embedding client
//!
//! Talks to any server exposing `/v1/embeddings` (llama.cpp, vLLM, TEI,
//! OpenAI itself). Requests are funneled through a [`RateLimiter`] so batch
//! indexing respects provider windows. When the server also exposes a
//! `/tokenize` endpoint the client doubles as a [`Tokenizer`] for exact
//! size measurement.

use crate::config::EmbeddingServiceConfig;
use crate::error::{CodeScoutError, Result};
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::traits::{Embedder, Tokenizer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct TokenizeRequest<'a> {
    model: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct TokenizeResponse {
    tokens: Vec<serde_json::Value>,
}

/// Embedding client for OpenAI-compatible HTTP servers
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingServiceConfig,
    limiter: RateLimiter,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let limiter = RateLimiter::new(config.rate_limit);
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.config.url.trim_end_matches('/'))
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts.iter().map(String::as_str).collect(),
        };

        let response = self
            .apply_auth(self.client.post(self.embeddings_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CodeScoutError::RateLimited(format!(
                "embedding service returned {status}"
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CodeScoutError::Embedding(format!(
                "embedding service returned {status}: {detail}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let mut rows = parsed.data;
        rows.sort_by_key(|d| d.index);

        if rows.len() != texts.len() {
            return Err(CodeScoutError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                rows.len()
            )));
        }

        for row in &rows {
            if row.embedding.len() != self.config.dimensions {
                return Err(CodeScoutError::Embedding(format!(
                    "expected {} dimensions, got {}",
                    self.config.dimensions,
                    row.embedding.len()
                )));
            }
        }

        Ok(rows.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| CodeScoutError::Embedding("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.config.model, "embedding batch");

        // rough token estimate for the tpm window
        let estimated: u32 = texts
            .iter()
            .map(|t| (t.chars().count() as u32).div_ceil(4))
            .sum();

        self.limiter
            .execute(estimated, || self.request_embeddings(texts))
            .await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Tokenizer for HttpEmbedder {
    async fn count_tokens(&self, text: &str) -> Result<usize> {
        let url = self.config.tokenize_url.clone().unwrap_or_else(|| {
            format!("{}/tokenize", self.config.url.trim_end_matches('/'))
        });

        let body = TokenizeRequest {
            model: &self.config.model,
            content: text,
        };

        let response = self
            .apply_auth(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CodeScoutError::RateLimited(format!(
                "tokenize endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(CodeScoutError::Embedding(format!(
                "tokenize endpoint returned {status}"
            )));
        }

        let parsed: TokenizeResponse = response.json().await?;
        Ok(parsed.tokens.len())
    }
}
