//! Provider ports: embedding inference, vector storage, chunk strategies.

use crate::entities::CodeChunk;
use crate::error::Result;
use crate::value_objects::{Embedding, EmbeddingRecord, IndexInfo, ScoredRecord, VectorFilter};
use async_trait::async_trait;

/// Batch text-embedding inference
///
/// Implementations must return one embedding per input text, in input
/// order. Dimensionality is a property of the configured model and is
/// probed empirically at initialization rather than trusted blindly.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Nominal dimensionality advertised by the provider configuration
    fn dimensions(&self) -> usize;

    /// Identifier for the provider (e.g. "openai", "null")
    fn provider_name(&self) -> &str;
}

/// Vector backend scoped by tenant/project/namespace filters
///
/// One logical index per deployment; records carry their scope in
/// metadata and every query or bulk deletion is filter-scoped so that
/// tenants never observe each other's vectors.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Describe the backing index, `None` if it does not exist yet
    async fn describe_index(&self) -> Result<Option<IndexInfo>>;

    /// Create the backing index with the given dimensionality
    async fn create_index(&self, dimensions: usize) -> Result<()>;

    /// Drop the backing index and everything in it
    async fn delete_index(&self) -> Result<()>;

    /// Insert or overwrite records by id
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Similarity query restricted to the filter scope
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredRecord>>;

    /// Delete records by exact id
    async fn delete_by_ids(&self, ids: &[String]) -> Result<()>;

    /// Delete every record inside the filter scope
    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()>;

    /// Identifier for the backend (e.g. "pinecone", "in_memory")
    fn provider_name(&self) -> &str;
}

/// One chunk-boundary detection scheme per language family
///
/// Strategies are pure text transforms: same input, same ordered chunk
/// list. New languages plug in without touching the orchestrator.
pub trait ChunkStrategy: Send + Sync {
    /// Split file content into named, typed chunks
    fn chunk(&self, file_path: &str, content: &str) -> Vec<CodeChunk>;

    /// Identifier for the strategy (e.g. "tree-sitter", "brace", "indent")
    fn strategy_name(&self) -> &str;
}
