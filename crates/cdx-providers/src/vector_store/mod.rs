//! Vector backend implementations.
//!
//! `PineconeVectorBackend` talks to a Pinecone-style REST API;
//! `InMemoryVectorBackend` keeps everything in process for development
//! and tests. Both are scoped by tenant/project/namespace filters.

pub mod in_memory;
pub mod pinecone;

pub use in_memory::InMemoryVectorBackend;
pub use pinecone::PineconeVectorBackend;
