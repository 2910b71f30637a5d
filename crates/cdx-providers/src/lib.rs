//! Provider adapters for the code-index core.
//!
//! Implements the domain provider ports: chunk-boundary detection per
//! language family, embedding inference, and vector storage backends.

pub mod chunking;
pub mod embedding;
pub mod vector_store;

pub use chunking::Chunker;
pub use embedding::{NullEmbeddingProvider, OpenAiEmbeddingProvider};
pub use vector_store::{InMemoryVectorBackend, PineconeVectorBackend};
