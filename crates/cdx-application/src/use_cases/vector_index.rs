//! Embedding plus vector-backend orchestration for one tenant.
//!
//! The service owns the index lifecycle: it probes the provider's real
//! dimensionality at startup, reconciles it against any pre-existing
//! index, and from then on guarantees every vector it writes matches the
//! effective dimensionality.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use cdx_domain::constants::{
    BATCH_PACING_MS, DIMENSION_PROBE_TEXT, MAX_EMBED_CHARS, TRUNCATION_MARKER,
};
use cdx_domain::entities::CodeChunk;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::providers::{EmbeddingProvider, VectorBackend};
use cdx_domain::value_objects::{
    ChunkMetadata, ChunkNamespace, EmbeddingRecord, Tenant, VectorFilter,
};
use tracing::{info, warn};

/// What to do when the provider's probed dimensionality disagrees with an
/// existing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionMismatchPolicy {
    /// Drop the existing index and recreate it at the probed size. All
    /// stored vectors are lost.
    Recreate,
    /// Keep the existing index and pad or truncate new vectors to fit it.
    Adapt,
}

/// Tenant-scoped embedding and vector storage service
pub struct VectorIndexService {
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorBackend>,
    tenant: Tenant,
    mismatch_policy: Option<DimensionMismatchPolicy>,
    batch_pacing: Duration,
    /// Effective dimensionality, set by `initialize`
    dimensions: RwLock<Option<usize>>,
}

impl VectorIndexService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn VectorBackend>,
        tenant: Tenant,
    ) -> Self {
        Self {
            embedder,
            backend,
            tenant,
            mismatch_policy: None,
            batch_pacing: Duration::from_millis(BATCH_PACING_MS),
            dimensions: RwLock::new(None),
        }
    }

    /// Opt into automatic resolution of dimensionality conflicts. Without
    /// a policy, a mismatch fails `initialize`.
    pub fn with_mismatch_policy(mut self, policy: DimensionMismatchPolicy) -> Self {
        self.mismatch_policy = Some(policy);
        self
    }

    /// Override the inter-batch pacing delay (tests use zero).
    pub fn with_batch_pacing(mut self, pacing: Duration) -> Self {
        self.batch_pacing = pacing;
        self
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Probe the provider's real output dimensionality and reconcile it
    /// with the backend index, creating the index when absent.
    pub async fn initialize(&self) -> Result<()> {
        let probe = self
            .embedder
            .embed_batch(&[DIMENSION_PROBE_TEXT.to_string()])
            .await?;
        let probed = probe
            .first()
            .map(|e| e.vector.len())
            .filter(|d| *d > 0)
            .ok_or_else(|| Error::embedding("dimension probe returned no vector"))?;

        let effective = match self.backend.describe_index().await? {
            None => {
                self.backend.create_index(probed).await?;
                info!(
                    "[VECTOR] created index with {} dimensions ({})",
                    probed,
                    self.embedder.provider_name()
                );
                probed
            }
            Some(info) if info.dimensions == probed => probed,
            Some(info) => match self.mismatch_policy {
                Some(DimensionMismatchPolicy::Recreate) => {
                    warn!(
                        "[VECTOR] index has {} dimensions, provider produces {}; recreating",
                        info.dimensions, probed
                    );
                    self.backend.delete_index().await?;
                    self.backend.create_index(probed).await?;
                    probed
                }
                Some(DimensionMismatchPolicy::Adapt) => {
                    warn!(
                        "[VECTOR] index has {} dimensions, provider produces {}; adapting vectors",
                        info.dimensions, probed
                    );
                    info.dimensions
                }
                None => {
                    return Err(Error::DimensionMismatch {
                        existing: info.dimensions,
                        probed,
                    });
                }
            },
        };

        *self.dimensions.write().unwrap_or_else(|e| e.into_inner()) = Some(effective);
        Ok(())
    }

    /// Effective dimensionality; errors when `initialize` has not run.
    pub fn effective_dimensions(&self) -> Result<usize> {
        self.dimensions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .ok_or_else(|| Error::internal("vector index service not initialized"))
    }

    /// Embed texts, clipping oversized inputs and fitting every vector to
    /// the effective dimensionality. A provider failure degrades to zero
    /// vectors so callers keep their positional bookkeeping.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dims = self.effective_dimensions()?;
        let prepared: Vec<String> = texts.iter().map(|t| Self::clip(t)).collect();
        match self.embedder.embed_batch(&prepared).await {
            Ok(embeddings) => Ok(embeddings
                .into_iter()
                .map(|e| Self::fit(e.vector, dims))
                .collect()),
            Err(e) => {
                warn!(
                    "[VECTOR] embedding failed, substituting zero vectors for {} texts: {}",
                    texts.len(),
                    e
                );
                Ok(vec![vec![0.0; dims]; texts.len()])
            }
        }
    }

    /// Embed and store chunks in fixed-size batches with pacing between
    /// backend calls. A failed batch is logged and skipped; the returned
    /// list holds exactly the chunk ids that made it into the backend.
    pub async fn upsert_chunks(
        &self,
        chunks: &[CodeChunk],
        namespace: ChunkNamespace,
        batch_size: usize,
    ) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = batch_size.max(1);
        let mut stored = Vec::with_capacity(chunks.len());
        let batches: Vec<&[CodeChunk]> = chunks.chunks(batch_size).collect();
        let last = batches.len() - 1;
        for (i, batch) in batches.into_iter().enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embed(&texts).await?;
            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord {
                    id: self.tenant.vector_id(namespace, &chunk.id),
                    vector,
                    metadata: ChunkMetadata::from_chunk(chunk, &self.tenant, namespace),
                })
                .collect();
            match self.backend.upsert(&records).await {
                Ok(()) => stored.extend(batch.iter().map(|c| c.id.clone())),
                Err(e) => warn!(
                    "[VECTOR] upsert batch {} ({} chunks) failed, skipping: {}",
                    i,
                    batch.len(),
                    e
                ),
            }
            if i < last && !self.batch_pacing.is_zero() {
                tokio::time::sleep(self.batch_pacing).await;
            }
        }
        Ok(stored)
    }

    /// Similarity search scoped to this tenant and namespace.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        namespace: ChunkNamespace,
    ) -> Result<Vec<CodeChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vectors = self.embed(&[text.to_string()]).await?;
        let Some(vector) = vectors.into_iter().next() else {
            return Ok(Vec::new());
        };
        let filter = VectorFilter::for_tenant(&self.tenant, Some(namespace));
        let hits = self.backend.query(&vector, top_k, &filter).await?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let chunk_id = self
                    .tenant
                    .strip_vector_id(namespace, &hit.id)
                    .unwrap_or(&hit.id)
                    .to_string();
                hit.metadata.into_chunk(chunk_id)
            })
            .collect())
    }

    /// Delete chunks by their chunk ids within a namespace.
    pub async fn delete_chunks(
        &self,
        chunk_ids: &[String],
        namespace: ChunkNamespace,
    ) -> Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let vector_ids: Vec<String> = chunk_ids
            .iter()
            .map(|id| self.tenant.vector_id(namespace, id))
            .collect();
        self.backend.delete_by_ids(&vector_ids).await
    }

    /// Delete everything stored for this tenant across both namespaces.
    pub async fn clear(&self) -> Result<()> {
        let filter = VectorFilter::for_tenant(&self.tenant, None);
        self.backend.delete_by_filter(&filter).await
    }

    fn clip(text: &str) -> String {
        if text.chars().count() <= MAX_EMBED_CHARS {
            return text.to_string();
        }
        let keep = MAX_EMBED_CHARS.saturating_sub(TRUNCATION_MARKER.chars().count());
        let mut clipped: String = text.chars().take(keep).collect();
        clipped.push_str(TRUNCATION_MARKER);
        clipped
    }

    fn fit(mut vector: Vec<f32>, dims: usize) -> Vec<f32> {
        if vector.len() != dims {
            vector.resize(dims, 0.0);
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdx_domain::entities::ChunkKind;
    use cdx_domain::value_objects::Embedding;
    use cdx_providers::embedding::NullEmbeddingProvider;
    use cdx_providers::vector_store::InMemoryVectorBackend;

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Err(Error::embedding("provider offline"))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    fn chunk(name: &str, content: &str) -> CodeChunk {
        CodeChunk::new(
            content.to_string(),
            "src/lib.rs".to_string(),
            1,
            3,
            ChunkKind::Function,
            name.to_string(),
        )
    }

    fn service(backend: Arc<InMemoryVectorBackend>) -> VectorIndexService {
        VectorIndexService::new(
            Arc::new(NullEmbeddingProvider::new(16)),
            backend,
            Tenant::new("alice", "proj"),
        )
        .with_batch_pacing(Duration::from_millis(0))
    }

    #[tokio::test]
    async fn initialize_creates_index_at_probed_dimensions() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.initialize().await.unwrap();
        assert_eq!(svc.effective_dimensions().unwrap(), 16);
        let info = backend.describe_index().await.unwrap().unwrap();
        assert_eq!(info.dimensions, 16);
    }

    #[tokio::test]
    async fn mismatch_without_policy_fails() {
        let backend = Arc::new(InMemoryVectorBackend::with_index(32));
        let svc = service(Arc::clone(&backend));
        let err = svc.initialize().await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                existing: 32,
                probed: 16
            }
        ));
    }

    #[tokio::test]
    async fn mismatch_with_recreate_rebuilds_the_index() {
        let backend = Arc::new(InMemoryVectorBackend::with_index(32));
        let svc = service(Arc::clone(&backend))
            .with_mismatch_policy(DimensionMismatchPolicy::Recreate);
        svc.initialize().await.unwrap();
        let info = backend.describe_index().await.unwrap().unwrap();
        assert_eq!(info.dimensions, 16);
    }

    #[tokio::test]
    async fn mismatch_with_adapt_keeps_existing_dimensions() {
        let backend = Arc::new(InMemoryVectorBackend::with_index(32));
        let svc =
            service(Arc::clone(&backend)).with_mismatch_policy(DimensionMismatchPolicy::Adapt);
        svc.initialize().await.unwrap();
        assert_eq!(svc.effective_dimensions().unwrap(), 32);
        // Stored vectors are padded up to the index size.
        let stored = svc
            .upsert_chunks(&[chunk("f", "fn f() {}")], ChunkNamespace::Source, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn upsert_then_query_round_trips_chunk_ids() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.initialize().await.unwrap();
        let chunks = vec![
            chunk("alpha", "fn alpha() { 1 }"),
            chunk("beta", "fn beta() { 2 }"),
        ];
        let stored = svc
            .upsert_chunks(&chunks, ChunkNamespace::Source, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        let hits = svc
            .query("fn alpha() { 1 }", 2, ChunkNamespace::Source)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|c| c.id == chunks[0].id));
    }

    #[tokio::test]
    async fn provider_failure_after_initialize_degrades_to_zero_vectors() {
        let backend = Arc::new(InMemoryVectorBackend::with_index(8));
        let svc = VectorIndexService::new(
            Arc::new(FailingEmbedder),
            Arc::clone(&backend) as Arc<dyn VectorBackend>,
            Tenant::new("alice", "proj"),
        )
        .with_batch_pacing(Duration::from_millis(0))
        .with_mismatch_policy(DimensionMismatchPolicy::Adapt);
        // Initialization needs a live provider, so seed dimensions directly
        // through a working embed path is not possible here; emulate the
        // post-initialization state.
        *svc.dimensions.write().unwrap() = Some(8);
        let vectors = svc.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.0; 8]]);
    }

    #[tokio::test]
    async fn delete_chunks_removes_only_named_ids() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.initialize().await.unwrap();
        let chunks = vec![chunk("alpha", "fn alpha() {}"), chunk("beta", "fn beta() {}")];
        svc.upsert_chunks(&chunks, ChunkNamespace::Source, 10)
            .await
            .unwrap();
        svc.delete_chunks(std::slice::from_ref(&chunks[0].id), ChunkNamespace::Source)
            .await
            .unwrap();
        let hits = svc.query("fn beta() {}", 5, ChunkNamespace::Source).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, chunks[1].id);
    }

    #[tokio::test]
    async fn clear_empties_both_namespaces() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let svc = service(Arc::clone(&backend));
        svc.initialize().await.unwrap();
        svc.upsert_chunks(&[chunk("s", "fn s() {}")], ChunkNamespace::Source, 10)
            .await
            .unwrap();
        svc.upsert_chunks(&[chunk("t", "fn t() {}")], ChunkNamespace::Test, 10)
            .await
            .unwrap();
        svc.clear().await.unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn clip_preserves_short_text_and_marks_long_text() {
        let short = "short text";
        assert_eq!(VectorIndexService::clip(short), short);
        let long = "x".repeat(MAX_EMBED_CHARS + 100);
        let clipped = VectorIndexService::clip(&long);
        assert_eq!(clipped.chars().count(), MAX_EMBED_CHARS);
        assert!(clipped.ends_with(TRUNCATION_MARKER));
    }
}
