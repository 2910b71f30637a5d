//! Value objects exchanged across the vector-backend boundary.
//!
//! Everything that crosses into the backend is carried by a strict schema
//! ([`ChunkMetadata`]) rather than an untyped metadata blob, and is
//! validated by construction.

use crate::constants::METADATA_EXCERPT_CHARS;
use crate::entities::{ChunkKind, CodeChunk};
use serde::{Deserialize, Serialize};

/// Dense vector produced by an embedding provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Embedding {
    /// The embedding vector values
    pub vector: Vec<f32>,
    /// Name of the model that generated this embedding
    pub model: String,
    /// Dimensionality of the embedding vector
    pub dimensions: usize,
}

/// Partition of the vector backend separating source from test chunks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkNamespace {
    Source,
    Test,
}

impl ChunkNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for ChunkNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `(user, project)` pair scoping all stored vectors and queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tenant {
    pub user: String,
    pub project: String,
}

impl Tenant {
    pub fn new<U: Into<String>, P: Into<String>>(user: U, project: P) -> Self {
        Self {
            user: user.into(),
            project: project.into(),
        }
    }

    /// Scope key used as the first component of backend vector ids.
    pub fn key(&self) -> String {
        format!("{}-{}", self.user, self.project)
    }

    /// Backend vector id for a chunk in a namespace.
    pub fn vector_id(&self, namespace: ChunkNamespace, chunk_id: &str) -> String {
        format!("{}_{}_{}", self.key(), namespace, chunk_id)
    }

    /// Recover the chunk id from a backend vector id, if it carries this
    /// tenant/namespace prefix.
    pub fn strip_vector_id<'a>(
        &self,
        namespace: ChunkNamespace,
        vector_id: &'a str,
    ) -> Option<&'a str> {
        vector_id.strip_prefix(&format!("{}_{}_", self.key(), namespace))
    }
}

/// Strict metadata schema stored alongside every vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Size-capped content excerpt
    pub excerpt: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: ChunkKind,
    pub name: String,
    pub tenant: String,
    pub project: String,
    pub namespace: ChunkNamespace,
}

impl ChunkMetadata {
    /// Build the metadata record for a chunk, capping the excerpt.
    pub fn from_chunk(chunk: &CodeChunk, tenant: &Tenant, namespace: ChunkNamespace) -> Self {
        let excerpt = if chunk.content.chars().count() > METADATA_EXCERPT_CHARS {
            chunk.content.chars().take(METADATA_EXCERPT_CHARS).collect()
        } else {
            chunk.content.clone()
        };
        Self {
            excerpt,
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            kind: chunk.kind,
            name: chunk.name.clone(),
            tenant: tenant.user.clone(),
            project: tenant.project.clone(),
            namespace,
        }
    }

    /// Reconstruct a chunk view from stored metadata. Content is the
    /// excerpt the backend kept; the chunk id must be supplied by the
    /// caller after prefix stripping.
    pub fn into_chunk(self, chunk_id: String) -> CodeChunk {
        CodeChunk {
            id: chunk_id,
            content: self.excerpt,
            file_path: self.file_path,
            start_line: self.start_line,
            end_line: self.end_line,
            kind: self.kind,
            name: self.name,
        }
    }
}

/// Embedding plus metadata as stored in the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A query hit returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Tenant/project/namespace scoping applied to queries and deletions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorFilter {
    pub tenant: String,
    pub project: String,
    /// `None` matches both namespaces
    pub namespace: Option<ChunkNamespace>,
}

impl VectorFilter {
    pub fn for_tenant(tenant: &Tenant, namespace: Option<ChunkNamespace>) -> Self {
        Self {
            tenant: tenant.user.clone(),
            project: tenant.project.clone(),
            namespace,
        }
    }

    /// Whether a metadata record falls inside this filter scope.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        metadata.tenant == self.tenant
            && metadata.project == self.project
            && self.namespace.is_none_or(|ns| metadata.namespace == ns)
    }
}

/// Description of an existing backend index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexInfo {
    pub dimensions: usize,
    pub total_vectors: u64,
}

/// Stage of a bulk indexing pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStage {
    Scanning,
    Parsing,
    Embedding,
    Storing,
    Complete,
}

impl std::fmt::Display for IndexingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "scanning"),
            Self::Parsing => write!(f, "parsing"),
            Self::Embedding => write!(f, "embedding"),
            Self::Storing => write!(f, "storing"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Structured progress update emitted to an external observer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexingProgress {
    pub stage: IndexingStage,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ChunkKind;

    fn chunk() -> CodeChunk {
        CodeChunk::new(
            "fn f() {}".into(),
            "src/a.rs".into(),
            1,
            1,
            ChunkKind::Function,
            "f".into(),
        )
    }

    #[test]
    fn vector_id_round_trips_through_prefix_strip() {
        let tenant = Tenant::new("alice", "proj");
        let id = tenant.vector_id(ChunkNamespace::Source, "src/a.rs:f:1");
        assert_eq!(id, "alice-proj_source_src/a.rs:f:1");
        assert_eq!(
            tenant.strip_vector_id(ChunkNamespace::Source, &id),
            Some("src/a.rs:f:1")
        );
        assert_eq!(tenant.strip_vector_id(ChunkNamespace::Test, &id), None);
    }

    #[test]
    fn metadata_excerpt_is_capped() {
        let mut big = chunk();
        big.content = "x".repeat(METADATA_EXCERPT_CHARS + 500);
        let tenant = Tenant::new("alice", "proj");
        let meta = ChunkMetadata::from_chunk(&big, &tenant, ChunkNamespace::Source);
        assert_eq!(meta.excerpt.chars().count(), METADATA_EXCERPT_CHARS);
    }

    #[test]
    fn filter_scopes_by_namespace_when_present() {
        let tenant = Tenant::new("alice", "proj");
        let meta = ChunkMetadata::from_chunk(&chunk(), &tenant, ChunkNamespace::Source);
        let all = VectorFilter::for_tenant(&tenant, None);
        let tests_only = VectorFilter::for_tenant(&tenant, Some(ChunkNamespace::Test));
        assert!(all.matches(&meta));
        assert!(!tests_only.matches(&meta));
    }
}
