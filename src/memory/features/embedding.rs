// src/memory/features/embedding.rs

//! Embedding provider adapter for OpenAI-compatible APIs, plus the bounded
//! retry helper every embedding call goes through.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::memory::core::error::EmbeddingError;
use crate::memory::core::traits::EmbeddingProvider;

/// Retry policy for transient embedding failures.
#[derive(Debug, Clone)]
pub struct EmbeddingRetryConfig {
    pub max_attempts: usize,
    pub backoff_ms: u64,
}

impl Default for EmbeddingRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-style `/v1/embeddings` endpoint.
pub struct OpenAiEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
        })
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> EmbeddingError {
        // 429 means quota exhaustion here, not rate pressure worth retrying.
        if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            EmbeddingError::Transient(format!("{status}: {body}"))
        } else {
            EmbeddingError::Permanent(format!("{status}: {body}"))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::Permanent("empty input".to_string()));
        }

        let body = json!({
            "model": self.model,
            "input": [text],
            "dimensions": self.dimensions,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    EmbeddingError::Transient(e.to_string())
                } else {
                    EmbeddingError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Permanent(format!("malformed response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Permanent("no embedding returned".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embed with bounded retry. Transient failures back off and retry up to
/// `max_attempts`; permanent failures return immediately.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    text: &str,
    config: &EmbeddingRetryConfig,
) -> Result<Vec<f32>, EmbeddingError> {
    let mut attempt = 1;
    loop {
        match provider.embed(text).await {
            Ok(embedding) => {
                debug!("Embedded {} chars on attempt {}", text.len(), attempt);
                return Ok(embedding);
            }
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                warn!(
                    "Embedding attempt {}/{} failed: {}",
                    attempt, config.max_attempts, e
                );
                tokio::time::sleep(Duration::from_millis(config.backoff_ms * attempt as u64))
                    .await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
