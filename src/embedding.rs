//! Embedding provider interface and the HTTP implementation.
//!
//! [`Embedder`] is the narrow capability the pipeline consumes: a batch of
//! texts in, one unit-normalized vector per text out, in order.
//! [`HttpEmbedder`] targets an OpenAI-shaped `POST {base}/v1/embeddings`
//! endpoint with a bearer credential. Calls are blocking with a
//! client-level timeout and are never retried here; a non-success status is
//! surfaced verbatim as [`Error::Provider`].

use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const PROVIDER: &str = "embedding";

/// Batch-capable text embedding provider.
///
/// Implementations must return exactly one vector per input text, in input
/// order, normalized to unit length.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider backed by an OpenAI-compatible REST endpoint.
pub struct HttpEmbedder {
    config: EmbeddingConfig,
    client: reqwest::blocking::Client,
}

impl HttpEmbedder {
    /// Build the provider. A missing API key is *not* an error here; it is
    /// reported at the first call so configuration problems carry context.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
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
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("embedding.api_key is not set".into()))?;

        let url = format!(
            "{}/v1/embeddings",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
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

        let parsed: EmbeddingResponse = response.json().map_err(|e| Error::Transport {
            provider: PROVIDER,
            source: e,
        })?;

        if parsed.data.len() != texts.len() {
            return Err(Error::InvalidResponse {
                provider: PROVIDER,
                detail: format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }

        Ok(parsed
            .data
            .into_iter()
            .map(|item| normalize(item.embedding))
            .collect())
    }
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Cosine similarity between two vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
