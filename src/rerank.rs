//! Cross-encoder reranking provider.
//!
//! The reranker scores `(query, document)` pairs for fine-grained relevance
//! and is the sole cross-stage arbiter of the retrieval pipeline when
//! enabled. [`HttpReranker`] targets a `POST {base}/v1/rerank` endpoint
//! (`{model, query, documents}` in, `results[].relevance_score` out).

use serde::Deserialize;
use std::time::Duration;

use crate::config::RerankConfig;
use crate::error::{Error, Result};

const PROVIDER: &str = "rerank";

/// Batch-capable relevance scorer. Returned scores are in input order;
/// higher means more relevant. Score magnitudes are model-specific logits
/// and only meaningful relative to one another.
pub trait Reranker: Send + Sync {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Reranking provider backed by a REST endpoint.
pub struct HttpReranker {
    config: RerankConfig,
    client: reqwest::blocking::Client,
}

impl HttpReranker {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Transport {
                provider: PROVIDER,
                source: e,
            })?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl Reranker for HttpReranker {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("rerank.api_key is not set".into()))?;

        let url = format!("{}/v1/rerank", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "query": query,
            "documents": documents,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::Transport {
                provider: PROVIDER,
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Provider {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RerankResponse = response.json().map_err(|e| Error::Transport {
            provider: PROVIDER,
            source: e,
        })?;

        // Providers return results sorted by relevance; restore input order.
        let mut scores = vec![f32::NEG_INFINITY; documents.len()];
        for result in parsed.results {
            if result.index >= scores.len() {
                return Err(Error::InvalidResponse {
                    provider: PROVIDER,
                    detail: format!("result index {} out of range", result.index),
                });
            }
            scores[result.index] = result.relevance_score;
        }

        Ok(scores)
    }
}
