//! Filesystem adapters behind [`FileSystemPort`].
//!
//! `TokioFileSystem` is the production adapter over `tokio::fs`;
//! `InMemoryFileSystem` backs tests with controllable content, mtimes and
//! watch events.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::infrastructure::{FileEvent, FileStat, FileSystemPort};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Production filesystem adapter. Watch events are fed in externally by
/// whatever watcher integration the host embeds (editor hooks, notify
/// bridges) through [`TokioFileSystem::emit`].
#[derive(Default)]
pub struct TokioFileSystem {
    watchers: Mutex<Vec<mpsc::UnboundedSender<FileEvent>>>,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward an externally observed change event to all subscribers.
    pub fn emit(&self, event: FileEvent) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[async_trait]
impl FileSystemPort for TokioFileSystem {
    async fn read_to_string(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_source(format!("reading {path}"), e))
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::io_with_source(format!("stat {path}"), e))?;
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(FileStat {
            mtime_ms,
            size: meta.len(),
        })
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    fn watch(&self) -> mpsc::UnboundedReceiver<FileEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}

/// In-process filesystem with scripted content and events, for tests.
pub struct InMemoryFileSystem {
    files: DashMap<String, (String, FileStat)>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<FileEvent>>>,
    clock_ms: AtomicI64,
}

impl Default for InMemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self {
            files: DashMap::new(),
            watchers: Mutex::new(Vec::new()),
            clock_ms: AtomicI64::new(now),
        }
    }

    /// Write a file, advancing the internal mtime clock.
    pub async fn write_file(&self, path: &str, content: &str) {
        let mtime = self.clock_ms.fetch_add(1_000, Ordering::SeqCst) + 1_000;
        self.write_file_at(path, content, mtime).await;
    }

    /// Write a file with an explicit mtime.
    pub async fn write_file_at(&self, path: &str, content: &str, mtime_ms: i64) {
        let stat = FileStat {
            mtime_ms,
            size: content.len() as u64,
        };
        self.files
            .insert(path.to_string(), (content.to_string(), stat));
    }

    /// Remove a file; subsequent reads and stats fail.
    pub async fn remove_file(&self, path: &str) {
        self.files.remove(path);
    }

    /// Bump only the mtime, keeping content unchanged.
    pub async fn touch(&self, path: &str, mtime_ms: i64) {
        if let Some(mut entry) = self.files.get_mut(path) {
            entry.1.mtime_ms = mtime_ms;
        }
    }

    /// Deliver a watch event to all subscribers.
    pub fn emit(&self, event: FileEvent) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[async_trait]
impl FileSystemPort for InMemoryFileSystem {
    async fn read_to_string(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .map(|entry| entry.0.clone())
            .ok_or_else(|| Error::io(format!("no such file: {path}")))
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        self.files
            .get(path)
            .map(|entry| entry.1)
            .ok_or_else(|| Error::io(format!("no such file: {path}")))
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn watch(&self) -> mpsc::UnboundedReceiver<FileEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}
