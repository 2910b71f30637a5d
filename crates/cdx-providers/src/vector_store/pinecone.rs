//! Pinecone-style REST vector backend.
//!
//! Index lifecycle goes through `/indexes/{name}`; vector operations go
//! through `/indexes/{name}/vectors/*` and `/indexes/{name}/query`.
//! Structured backend causes (not-found, auth, rate-limit) are classified
//! into the domain error taxonomy; everything else surfaces as a generic
//! vector-database failure.

use async_trait::async_trait;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::providers::VectorBackend;
use cdx_domain::value_objects::{EmbeddingRecord, IndexInfo, ScoredRecord, VectorFilter};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Default per-request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct PineconeVectorBackend {
    client: Client,
    base_url: String,
    api_key: String,
    index_name: String,
    timeout: Duration,
}

impl PineconeVectorBackend {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g. "https://api.pinecone.example")
    /// * `api_key` - API key sent as the `Api-Key` header
    /// * `index_name` - Index scoping every operation
    /// * `timeout_secs` - Per-request timeout (default 30s)
    pub fn new(
        base_url: String,
        api_key: String,
        index_name: String,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            index_name,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }

    fn index_url(&self) -> String {
        format!("{}/indexes/{}", self.base_url, self.index_name)
    }

    async fn post_json(&self, url: String, payload: serde_json::Value) -> Result<Response> {
        self.client
            .post(url)
            .header("Api-Key", &self.api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("request failed: {e}")))
    }

    /// Classify an error response into the domain taxonomy.
    async fn classify(response: Response, operation: &str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Error::not_found(format!("{operation}: {body}")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Error::authentication(format!("{operation}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => Error::rate_limited(format!("{operation}: {body}")),
            _ => Error::vector_db(format!("{operation} returned {status}: {body}")),
        }
    }

    async fn check(response: Response, operation: &str) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::classify(response, operation).await)
        }
    }

    fn filter_json(filter: &VectorFilter) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "tenant": filter.tenant,
            "project": filter.project,
        });
        if let Some(namespace) = filter.namespace {
            obj["namespace"] = serde_json::json!(namespace.as_str());
        }
        obj
    }
}

#[async_trait]
impl VectorBackend for PineconeVectorBackend {
    async fn describe_index(&self) -> Result<Option<IndexInfo>> {
        let response = self
            .client
            .get(self.index_url())
            .header("Api-Key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("describe index failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, "describe index").await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("invalid describe response: {e}")))?;

        let dimensions = body["dimension"]
            .as_u64()
            .ok_or_else(|| Error::vector_db("describe response missing dimension"))?
            as usize;
        let total_vectors = body["totalVectorCount"].as_u64().unwrap_or(0);
        Ok(Some(IndexInfo {
            dimensions,
            total_vectors,
        }))
    }

    async fn create_index(&self, dimensions: usize) -> Result<()> {
        let payload = serde_json::json!({
            "name": self.index_name,
            "dimension": dimensions,
            "metric": "cosine",
        });
        let response = self
            .post_json(format!("{}/indexes", self.base_url), payload)
            .await?;
        Self::check(response, "create index").await?;
        Ok(())
    }

    async fn delete_index(&self) -> Result<()> {
        let response = self
            .client
            .delete(self.index_url())
            .header("Api-Key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("delete index failed: {e}")))?;
        Self::check(response, "delete index").await?;
        Ok(())
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                Ok(serde_json::json!({
                    "id": record.id,
                    "values": record.vector,
                    "metadata": serde_json::to_value(&record.metadata)?,
                }))
            })
            .collect::<Result<_>>()?;

        let response = self
            .post_json(
                format!("{}/vectors/upsert", self.index_url()),
                serde_json::json!({ "vectors": vectors }),
            )
            .await?;
        Self::check(response, "upsert vectors").await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let payload = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "filter": Self::filter_json(filter),
            "includeMetadata": true,
        });
        let response = self
            .post_json(format!("{}/query", self.index_url()), payload)
            .await?;
        let response = Self::check(response, "query vectors").await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("invalid query response: {e}")))?;

        let matches = body["matches"].as_array().cloned().unwrap_or_default();
        matches
            .into_iter()
            .map(|hit| {
                let id = hit["id"]
                    .as_str()
                    .ok_or_else(|| Error::vector_db("query match missing id"))?
                    .to_string();
                let score = hit["score"].as_f64().unwrap_or(0.0) as f32;
                let metadata = serde_json::from_value(hit["metadata"].clone())
                    .map_err(|e| Error::vector_db(format!("malformed match metadata: {e}")))?;
                Ok(ScoredRecord {
                    id,
                    score,
                    metadata,
                })
            })
            .collect()
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let response = self
            .post_json(
                format!("{}/vectors/delete", self.index_url()),
                serde_json::json!({ "ids": ids }),
            )
            .await?;
        Self::check(response, "delete vectors").await?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()> {
        let response = self
            .post_json(
                format!("{}/vectors/delete", self.index_url()),
                serde_json::json!({ "filter": Self::filter_json(filter) }),
            )
            .await?;
        Self::check(response, "delete by filter").await?;
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "pinecone"
    }
}
