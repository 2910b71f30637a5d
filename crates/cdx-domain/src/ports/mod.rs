//! Ports (hexagonal interfaces) consumed by the application layer.
//!
//! Provider ports cover the pluggable adapters (embedding, vector
//! backend, chunk strategies); infrastructure ports cover the ambient
//! collaborators (filesystem, persistence, progress sink).

pub mod infrastructure;
pub mod providers;

pub use infrastructure::{
    FileEvent, FileEventKind, FileStat, FileSystemPort, ProgressSink, StateStore,
};
pub use providers::{ChunkStrategy, EmbeddingProvider, VectorBackend};
