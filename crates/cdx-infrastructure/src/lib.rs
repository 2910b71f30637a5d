//! Infrastructure adapters: real filesystem and persistence behind the
//! domain ports, layered configuration loading and tracing setup.

pub mod config;
pub mod events;
pub mod fs;
pub mod state_store;
pub mod telemetry;

pub use config::AppConfig;
pub use events::{ChannelProgressSink, TracingProgressSink};
pub use fs::{InMemoryFileSystem, TokioFileSystem};
pub use state_store::{InMemoryStateStore, JsonFileStateStore};
