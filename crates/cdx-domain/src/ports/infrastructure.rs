//! Infrastructure ports: filesystem, persistence, progress notification.

use crate::error::Result;
use crate::value_objects::IndexingProgress;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// File stat subset the change detector needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Modification time, epoch milliseconds
    pub mtime_ms: i64,
    /// Size in bytes
    pub size: u64,
}

/// Kind of change reported by the watch stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

/// A single change event for a watched path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEvent {
    pub path: String,
    pub kind: FileEventKind,
}

/// Asynchronous filesystem access plus a change-event stream
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    /// Read a file as UTF-8 text
    async fn read_to_string(&self, path: &str) -> Result<String>;

    /// Stat a file
    async fn stat(&self, path: &str) -> Result<FileStat>;

    /// Whether a path currently exists on disk
    async fn exists(&self, path: &str) -> bool;

    /// Subscribe to change events. Filtering by include/exclude globs is
    /// the subscriber's concern; the port delivers raw events.
    fn watch(&self) -> mpsc::UnboundedReceiver<FileEvent>;
}

/// Key-value persistence for metadata maps and project state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Observer for bulk-indexing progress; optional, no-op if absent
pub trait ProgressSink: Send + Sync {
    fn notify(&self, progress: IndexingProgress);
}
