//! Application use cases.

pub mod index_manager;
pub mod retrieval;
pub mod vector_index;
