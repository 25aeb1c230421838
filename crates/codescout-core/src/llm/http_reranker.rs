//! Cross-encoder rerank client
//!
//! Posts a query plus candidate documents to an HTTP rerank endpoint and
//! maps the scored results back to input indices. Different servers wrap
//! their results differently (`{"results": [...]}`, `{"data": [...]}` or a
//! bare array), so the response parser accepts all three.

use crate::config::RerankServiceConfig;
use crate::error::{CodeScoutError, Result};
use crate::llm::traits::{RerankEntry, Reranker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
}

#[derive(Deserialize)]
struct RerankRow {
    index: usize,
    #[serde(alias = "score")]
    relevance_score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RerankResponse {
    Results { results: Vec<RerankRow> },
    Data { data: Vec<RerankRow> },
    Bare(Vec<RerankRow>),
}

impl RerankResponse {
    fn into_rows(self) -> Vec<RerankRow> {
        match self {
            RerankResponse::Results { results } => results,
            RerankResponse::Data { data } => data,
            RerankResponse::Bare(rows) => rows,
        }
    }
}

/// Rerank client for HTTP cross-encoder services
pub struct HttpReranker {
    client: reqwest::Client,
    config: RerankServiceConfig,
}

impl HttpReranker {
    pub fn new(config: RerankServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn rerank_url(&self) -> String {
        let base = self.config.url.trim_end_matches('/');
        if base.ends_with("/rerank") {
            base.to_string()
        } else {
            format!("{base}/rerank")
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<RerankEntry>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.config.model, "rerank request");

        let documents: Vec<&str> = texts.iter().map(String::as_str).collect();
        let body = RerankRequest {
            model: &self.config.model,
            query,
            documents: &documents,
        };

        let mut request = self.client.post(self.rerank_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CodeScoutError::ExternalError(format!(
                "rerank service returned {status}"
            )));
        }

        let parsed: RerankResponse = response.json().await?;
        let entries: Vec<RerankEntry> = parsed
            .into_rows()
            .into_iter()
            .filter(|row| row.index < texts.len())
            .map(|row| RerankEntry {
                index: row.index,
                relevance_score: row.relevance_score,
            })
            .collect();

        if entries.is_empty() {
            return Err(CodeScoutError::ExternalError(
                "rerank service returned no usable results".to_string(),
            ));
        }

        Ok(entries)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
