//! State-store adapters behind [`StateStore`].
//!
//! `JsonFileStateStore` persists the whole key space to one JSON file on
//! every write, which is cheap at the metadata sizes involved and keeps
//! recovery trivial. `InMemoryStateStore` backs tests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use cdx_domain::error::{Error, Result};
use cdx_domain::ports::infrastructure::StateStore;
use dashmap::DashMap;
use tokio::sync::Mutex;

/// Volatile key-value store for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, serde_json::Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON-file-backed key-value store.
pub struct JsonFileStateStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl JsonFileStateStore {
    /// Open the store, loading existing content if the file is present.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::io_with_source(
                    format!("reading state file {}", path.display()),
                    e,
                ));
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn flush(&self, entries: &HashMap<String, serde_json::Value>) -> Result<()> {
        let raw = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| Error::io_with_source(format!("writing {}", self.path.display()), e))
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        self.flush(&entries).await
    }
}
