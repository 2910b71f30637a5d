//! Embedding provider implementations.
//!
//! Converts text into dense vector embeddings for semantic search.
//! `OpenAiEmbeddingProvider` talks to an OpenAI-compatible HTTP API;
//! `NullEmbeddingProvider` produces deterministic hash-based vectors for
//! tests and offline operation.

pub mod null;
pub mod openai;

pub use null::NullEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
