//! Use-case layer: orchestration of chunking, embedding and vector storage.
//!
//! Services here depend only on the domain ports, so any provider
//! implementation can be injected at composition time.

pub mod debounce;
pub mod domain_services;
pub mod use_cases;

pub use domain_services::coverage::CoverageAnalyzer;
pub use use_cases::index_manager::IndexManager;
pub use use_cases::retrieval::{CancelFlag, ContextDocument, RetrievalAugmenter, RetrievedContext};
pub use use_cases::vector_index::{DimensionMismatchPolicy, VectorIndexService};
