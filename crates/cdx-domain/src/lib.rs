//! Domain layer for the code-index core.
//!
//! Holds the entities, value objects, configuration schema, error taxonomy
//! and the ports (provider + infrastructure traits) that the application
//! layer is wired against. This crate performs no I/O.

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod ports;
pub mod value_objects;

pub use config::IndexingConfig;
pub use entities::{
    ChunkKind, CodeChunk, IndexedFileMetadata, IndexingStrategy, Language, ProjectMetadata,
};
pub use error::{Error, Result};
pub use value_objects::{
    ChunkMetadata, ChunkNamespace, Embedding, EmbeddingRecord, IndexInfo, IndexingProgress,
    IndexingStage, ScoredRecord, Tenant, VectorFilter,
};
