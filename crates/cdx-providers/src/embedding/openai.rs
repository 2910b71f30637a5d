//! OpenAI embedding provider.
//!
//! Implements the `EmbeddingProvider` port against OpenAI's embeddings
//! endpoint (or any API-compatible server via a custom base URL).

use std::time::Duration;

use async_trait::async_trait;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::providers::EmbeddingProvider;
use cdx_domain::value_objects::Embedding;
use reqwest::Client;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embedding provider
///
/// Receives its HTTP client via constructor injection so callers control
/// pooling and timeouts.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    base_url: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a new OpenAI embedding provider
    ///
    /// # Arguments
    /// * `api_key` - API key
    /// * `base_url` - Optional custom base URL (defaults to the OpenAI API)
    /// * `model` - Model name (e.g. "text-embedding-3-small")
    /// * `timeout` - Per-request timeout
    /// * `http_client` - Reqwest client used for API requests
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self {
            api_key,
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn fetch_embeddings(&self, texts: &[String]) -> Result<serde_json::Value> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
            "encoding_format": "float"
        });

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::embedding(format!("request timed out after {:?}", self.timeout))
                } else {
                    Error::embedding(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => Error::authentication(format!("OpenAI rejected the API key: {body}")),
                429 => Error::rate_limited(format!("OpenAI rate limit: {body}")),
                _ => Error::embedding(format!("OpenAI returned {status}: {body}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("invalid JSON response: {e}")))
    }

    fn parse_embedding(&self, index: usize, item: &serde_json::Value) -> Result<Embedding> {
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| Error::embedding(format!("invalid embedding format for text {index}")))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        let dimensions = vector.len();
        Ok(Embedding {
            vector,
            model: self.model.clone(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response_data = self.fetch_embeddings(texts).await?;

        let data = response_data["data"]
            .as_array()
            .ok_or_else(|| Error::embedding("invalid response format: missing data array"))?;

        if data.len() != texts.len() {
            return Err(Error::embedding(format!(
                "response data count mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            )));
        }

        data.iter()
            .enumerate()
            .map(|(i, item)| self.parse_embedding(i, item))
            .collect()
    }

    fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            // text-embedding-3-small and ada-002 share 1536
            _ => 1536,
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
