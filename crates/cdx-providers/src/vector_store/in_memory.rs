//! In-memory vector backend.
//!
//! Stores records in a concurrent map; similarity search is cosine
//! distance with heap-based top-k selection. Not persisted across
//! restarts; intended for development and testing.

use async_trait::async_trait;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::providers::VectorBackend;
use cdx_domain::value_objects::{EmbeddingRecord, IndexInfo, ScoredRecord, VectorFilter};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::RwLock;

pub struct InMemoryVectorBackend {
    records: DashMap<String, EmbeddingRecord>,
    dimensions: RwLock<Option<usize>>,
}

impl Default for InMemoryVectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            dimensions: RwLock::new(None),
        }
    }

    /// Backend pre-seeded with an existing index, for mismatch tests.
    pub fn with_index(dimensions: usize) -> Self {
        let backend = Self::new();
        *backend.dimensions.write().expect("dimensions lock") = Some(dimensions);
        backend
    }

    /// Number of live records, across all scopes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a record with this exact id is live.
    pub fn contains_id(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn describe_index(&self) -> Result<Option<IndexInfo>> {
        let dims = *self.dimensions.read().expect("dimensions lock");
        Ok(dims.map(|dimensions| IndexInfo {
            dimensions,
            total_vectors: self.records.len() as u64,
        }))
    }

    async fn create_index(&self, dimensions: usize) -> Result<()> {
        let mut guard = self.dimensions.write().expect("dimensions lock");
        if guard.is_some() {
            return Err(Error::vector_db("index already exists"));
        }
        *guard = Some(dimensions);
        Ok(())
    }

    async fn delete_index(&self) -> Result<()> {
        *self.dimensions.write().expect("dimensions lock") = None;
        self.records.clear();
        Ok(())
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if self.dimensions.read().expect("dimensions lock").is_none() {
            return Err(Error::not_found("index"));
        }
        for record in records {
            self.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<ScoredRecord>> {
        // Precompute the query norm once.
        let query_norm = compute_norm(vector);

        // Min-heap keeps the best k in O(n log k).
        let mut heap: BinaryHeap<ScoredId> = BinaryHeap::with_capacity(top_k + 1);
        for entry in self.records.iter() {
            if !filter.matches(&entry.metadata) {
                continue;
            }
            let score = cosine_similarity_with_norm(vector, &entry.vector, query_norm);
            if heap.len() < top_k {
                heap.push(ScoredId {
                    score,
                    id: entry.id.clone(),
                });
            } else if let Some(min) = heap.peek() {
                if score > min.score {
                    heap.pop();
                    heap.push(ScoredId {
                        score,
                        id: entry.id.clone(),
                    });
                }
            }
        }

        let mut hits: Vec<ScoredId> = heap.into_iter().collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.records.get(&hit.id).map(|entry| ScoredRecord {
                    id: hit.id.clone(),
                    score: hit.score,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.records.remove(id);
        }
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<()> {
        self.records.retain(|_, record| !filter.matches(&record.metadata));
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "in_memory"
    }
}

/// Reverse-ordered so `BinaryHeap` behaves as a min-heap.
struct ScoredId {
    score: f32,
    id: String,
}

impl PartialEq for ScoredId {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for ScoredId {}

impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compute_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity_with_norm(a: &[f32], b: &[f32], norm_a: f32) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        // Normalized to [0, 1].
        (dot_product / (norm_a * norm_b) + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdx_domain::entities::{ChunkKind, CodeChunk};
    use cdx_domain::value_objects::{ChunkMetadata, ChunkNamespace, Tenant};

    fn record(id: &str, vector: Vec<f32>, namespace: ChunkNamespace) -> EmbeddingRecord {
        let tenant = Tenant::new("alice", "proj");
        let chunk = CodeChunk::new(
            format!("content of {id}"),
            "src/a.rs".into(),
            1,
            2,
            ChunkKind::Function,
            id.into(),
        );
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata::from_chunk(&chunk, &tenant, namespace),
        }
    }

    fn filter(namespace: Option<ChunkNamespace>) -> VectorFilter {
        VectorFilter::for_tenant(&Tenant::new("alice", "proj"), namespace)
    }

    #[tokio::test]
    async fn create_then_describe() {
        let backend = InMemoryVectorBackend::new();
        assert!(backend.describe_index().await.unwrap().is_none());
        backend.create_index(4).await.unwrap();
        let info = backend.describe_index().await.unwrap().unwrap();
        assert_eq!(info.dimensions, 4);
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_similarity() {
        let backend = InMemoryVectorBackend::new();
        backend.create_index(2).await.unwrap();
        backend
            .upsert(&[
                record("near", vec![1.0, 0.0], ChunkNamespace::Source),
                record("far", vec![-1.0, 0.0], ChunkNamespace::Source),
            ])
            .await
            .unwrap();

        let hits = backend
            .query(&[1.0, 0.0], 2, &filter(Some(ChunkNamespace::Source)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn namespace_filter_excludes_other_partition() {
        let backend = InMemoryVectorBackend::new();
        backend.create_index(2).await.unwrap();
        backend
            .upsert(&[
                record("src", vec![1.0, 0.0], ChunkNamespace::Source),
                record("tst", vec![1.0, 0.0], ChunkNamespace::Test),
            ])
            .await
            .unwrap();

        let hits = backend
            .query(&[1.0, 0.0], 10, &filter(Some(ChunkNamespace::Test)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "tst");
    }

    #[tokio::test]
    async fn empty_scope_returns_empty_not_error() {
        let backend = InMemoryVectorBackend::new();
        backend.create_index(2).await.unwrap();
        let hits = backend
            .query(&[1.0, 0.0], 5, &filter(Some(ChunkNamespace::Test)))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_by_ids_leaves_others_untouched() {
        let backend = InMemoryVectorBackend::new();
        backend.create_index(2).await.unwrap();
        backend
            .upsert(&[
                record("a", vec![1.0, 0.0], ChunkNamespace::Source),
                record("b", vec![0.0, 1.0], ChunkNamespace::Source),
            ])
            .await
            .unwrap();

        backend.delete_by_ids(&["a".to_string()]).await.unwrap();
        assert!(!backend.contains_id("a"));
        assert!(backend.contains_id("b"));
    }

    #[tokio::test]
    async fn delete_by_filter_clears_scope() {
        let backend = InMemoryVectorBackend::new();
        backend.create_index(2).await.unwrap();
        backend
            .upsert(&[
                record("a", vec![1.0, 0.0], ChunkNamespace::Source),
                record("b", vec![0.0, 1.0], ChunkNamespace::Test),
            ])
            .await
            .unwrap();

        backend
            .delete_by_filter(&filter(Some(ChunkNamespace::Source)))
            .await
            .unwrap();
        assert_eq!(backend.len(), 1);
        assert!(backend.contains_id("b"));
    }
}
