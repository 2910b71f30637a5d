//! Index lifecycle orchestration: watching, change detection, strategy
//! decisions, persistence and cleanup.
//!
//! The manager owns all file metadata. Change events are debounced per
//! path with latest-kind-wins semantics; unchanged files are skipped via
//! an mtime + checksum comparison; the smart strategy escalates to a full
//! re-index when the tracked set nears capacity or churns heavily.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use cdx_domain::config::IndexingConfig;
use cdx_domain::constants::{STATE_KEY_FILES, STATE_KEY_PROJECT};
use cdx_domain::entities::{IndexedFileMetadata, IndexingStrategy, ProjectMetadata};
use cdx_domain::error::Result;
use cdx_domain::ports::infrastructure::{
    FileEventKind, FileStat, FileSystemPort, ProgressSink, StateStore,
};
use cdx_domain::value_objects::{ChunkNamespace, IndexingProgress, IndexingStage};
use cdx_providers::chunking::Chunker;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::debounce::Debouncer;
use crate::domain_services::classify::namespace_for;
use crate::use_cases::vector_index::VectorIndexService;

/// Millisecond clock, injectable so tests can control time.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Orchestrates the full indexing lifecycle for one project.
pub struct IndexManager {
    config: IndexingConfig,
    fs: Arc<dyn FileSystemPort>,
    state: Arc<dyn StateStore>,
    vectors: Arc<VectorIndexService>,
    chunker: Chunker,
    progress: Option<Arc<dyn ProgressSink>>,
    clock: Clock,

    files: Mutex<HashMap<String, IndexedFileMetadata>>,
    project: Mutex<ProjectMetadata>,

    /// Latest pending event kind per path, overwritten by newer events
    pending: StdMutex<HashMap<String, FileEventKind>>,
    debouncers: StdMutex<HashMap<String, Arc<Debouncer>>>,
    indexing_in_flight: AtomicBool,
    watch_task: StdMutex<Option<JoinHandle<()>>>,
    cleanup_task: StdMutex<Option<JoinHandle<()>>>,
}

impl IndexManager {
    pub fn new(
        config: IndexingConfig,
        fs: Arc<dyn FileSystemPort>,
        state: Arc<dyn StateStore>,
        vectors: Arc<VectorIndexService>,
    ) -> Self {
        Self {
            config,
            fs,
            state,
            vectors,
            chunker: Chunker::new(),
            progress: None,
            clock: system_clock(),
            files: Mutex::new(HashMap::new()),
            project: Mutex::new(ProjectMetadata::default()),
            pending: StdMutex::new(HashMap::new()),
            debouncers: StdMutex::new(HashMap::new()),
            indexing_in_flight: AtomicBool::new(false),
            watch_task: StdMutex::new(None),
            cleanup_task: StdMutex::new(None),
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Restore metadata persisted by a previous run.
    pub async fn load_state(&self) -> Result<()> {
        if let Some(value) = self.state.get(STATE_KEY_FILES).await? {
            let restored: HashMap<String, IndexedFileMetadata> = serde_json::from_value(value)?;
            info!("[INDEX] restored metadata for {} files", restored.len());
            *self.files.lock().await = restored;
        }
        if let Some(value) = self.state.get(STATE_KEY_PROJECT).await? {
            *self.project.lock().await = serde_json::from_value(value)?;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let files = self.files.lock().await.clone();
        self.state
            .put(STATE_KEY_FILES, serde_json::to_value(&files)?)
            .await?;
        let project = self.project.lock().await.clone();
        self.state
            .put(STATE_KEY_PROJECT, serde_json::to_value(&project)?)
            .await
    }

    /// Number of files currently tracked.
    pub async fn tracked_files(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Metadata snapshot for a tracked file.
    pub async fn file_metadata(&self, path: &str) -> Option<IndexedFileMetadata> {
        self.files.lock().await.get(path).cloned()
    }

    /// Project-level state snapshot.
    pub async fn project_metadata(&self) -> ProjectMetadata {
        self.project.lock().await.clone()
    }

    /// Define the working set and start consuming watch events for it.
    /// Replaces any previous subscription.
    pub async fn set_watched_files(self: &Arc<Self>, files: Vec<String>) -> Result<()> {
        {
            let mut project = self.project.lock().await;
            project.included_files = files;
            project.strategy = self.config.strategy;
        }
        self.persist().await?;

        if !self.config.auto_indexing {
            debug!("[INDEX] auto indexing disabled, not subscribing to watch events");
            return Ok(());
        }

        let include = build_glob_set(&self.config.include_patterns)?;
        let exclude = build_glob_set(&self.config.exclude_patterns)?;
        let mut events = self.fs.watch();
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !include.is_match(&event.path) || exclude.is_match(&event.path) {
                    continue;
                }
                manager.enqueue_event(event.path, event.kind);
            }
        });
        let mut slot = self.watch_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Record an event and (re)arm the per-path debounce timer. The most
    /// recent kind wins when events collapse.
    fn enqueue_event(self: &Arc<Self>, path: String, kind: FileEventKind) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone(), kind);
        let debouncer = {
            let mut debouncers = self.debouncers.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(debouncers.entry(path.clone()).or_default())
        };
        let manager = Arc::clone(self);
        debouncer.schedule(
            Duration::from_millis(self.config.indexing_delay_ms),
            async move {
                manager.process_pending(&path).await;
            },
        );
    }

    async fn process_pending(&self, path: &str) {
        let kind = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
        self.debouncers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
        let result = match kind {
            Some(FileEventKind::Deleted) => self.handle_delete(path).await,
            Some(_) => self.handle_change(path).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            error!("[INDEX] failed to process {}: {}", path, e);
        }
    }

    /// Re-index a created or modified file. Unchanged content (same
    /// checksum, no newer mtime) is skipped without touching the backend.
    pub async fn handle_change(&self, path: &str) -> Result<()> {
        if !self.chunker.is_supported(path) {
            debug!("[INDEX] skipping unsupported file {}", path);
            return Ok(());
        }
        let Ok(stat) = self.fs.stat(path).await else {
            debug!("[INDEX] {} vanished before processing, skipping", path);
            return Ok(());
        };
        let content = match self.fs.read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("[INDEX] failed to read {}: {}", path, e);
                return Ok(());
            }
        };
        let checksum = checksum_hex(&content);
        {
            let files = self.files.lock().await;
            if let Some(meta) = files.get(path) {
                if meta.checksum == checksum && meta.last_modified >= stat.mtime_ms {
                    debug!("[INDEX] {} unchanged, skipping", path);
                    return Ok(());
                }
            }
        }

        if self.should_full_reindex().await {
            info!("[INDEX] change to {} escalating to full re-index", path);
            return self.full_reindex().await;
        }
        self.index_single_file(path, &content, stat, checksum).await
    }

    async fn index_single_file(
        &self,
        path: &str,
        content: &str,
        stat: FileStat,
        checksum: String,
    ) -> Result<()> {
        let namespace = namespace_for(path);
        let old_ids = {
            let files = self.files.lock().await;
            files.get(path).map(|m| m.chunk_ids.clone())
        };
        if let Some(ids) = old_ids {
            if !ids.is_empty() {
                self.vectors.delete_chunks(&ids, namespace).await?;
            }
        }

        let chunks = self.chunker.parse(path, content);
        let stored = self
            .vectors
            .upsert_chunks(&chunks, namespace, self.config.batch_size)
            .await?;
        let chunk_count = stored.len();
        let meta = IndexedFileMetadata {
            file_path: path.to_string(),
            last_modified: stat.mtime_ms,
            checksum,
            size: stat.size,
            chunk_ids: stored,
        };
        self.files.lock().await.insert(path.to_string(), meta);
        self.persist().await?;
        info!("[INDEX] indexed {} ({} chunks)", path, chunk_count);
        Ok(())
    }

    /// Remove a deleted file's chunks and metadata.
    pub async fn handle_delete(&self, path: &str) -> Result<()> {
        let meta = { self.files.lock().await.get(path).cloned() };
        let Some(meta) = meta else {
            return Ok(());
        };
        self.vectors
            .delete_chunks(&meta.chunk_ids, namespace_for(path))
            .await?;
        self.files.lock().await.remove(path);
        self.persist().await?;
        info!(
            "[INDEX] removed {} ({} chunks)",
            path,
            meta.chunk_ids.len()
        );
        Ok(())
    }

    /// Strategy decision for a single-file update.
    async fn should_full_reindex(&self) -> bool {
        match self.config.strategy {
            IndexingStrategy::Full => true,
            IndexingStrategy::Incremental => false,
            IndexingStrategy::Smart => {
                let files = self.files.lock().await;
                let tracked = files.len();
                let capacity =
                    self.config.full_reindex_capacity_ratio * self.config.max_index_size as f64;
                if tracked as f64 > capacity {
                    return true;
                }
                if tracked == 0 {
                    return false;
                }
                let now = (self.clock)();
                let window_ms = (self.config.recent_change_window_secs * 1_000) as i64;
                let recent = files
                    .values()
                    .filter(|m| now - m.last_modified <= window_ms)
                    .count();
                recent as f64 / tracked as f64 > self.config.recent_change_ratio
            }
        }
    }

    /// Drop everything and re-index the whole working set. Skipped with a
    /// warning if a bulk pass is already running.
    pub async fn full_reindex(&self) -> Result<()> {
        if !self.begin_indexing() {
            warn!("[INDEX] full re-index requested while indexing is in progress, skipping");
            return Ok(());
        }
        let result = self.full_reindex_inner().await;
        self.end_indexing();
        result
    }

    async fn full_reindex_inner(&self) -> Result<()> {
        self.vectors.clear().await?;
        self.files.lock().await.clear();
        let included = { self.project.lock().await.included_files.clone() };
        self.run_bulk(&included).await?;
        {
            let mut project = self.project.lock().await;
            project.last_full_index_time = Some((self.clock)());
        }
        self.persist().await
    }

    /// Bulk indexing entry point. Returns false without doing any work if
    /// another bulk pass is already in flight.
    pub async fn index_project_files(&self, files: &[String]) -> bool {
        if !self.begin_indexing() {
            warn!("[INDEX] bulk indexing rejected, another pass is in progress");
            return false;
        }
        let result = self.run_bulk(files).await;
        self.end_indexing();
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("[INDEX] bulk indexing failed: {}", e);
                false
            }
        }
    }

    /// Drop all stored vectors and tracked metadata.
    pub async fn clear_index(&self) -> bool {
        let result: Result<()> = async {
            self.vectors.clear().await?;
            self.files.lock().await.clear();
            *self.project.lock().await = ProjectMetadata {
                strategy: self.config.strategy,
                ..ProjectMetadata::default()
            };
            self.persist().await
        }
        .await;
        match result {
            Ok(()) => {
                info!("[INDEX] cleared index");
                true
            }
            Err(e) => {
                error!("[INDEX] failed to clear index: {}", e);
                false
            }
        }
    }

    async fn run_bulk(&self, files: &[String]) -> Result<()> {
        let total = files.len();
        self.report(IndexingStage::Scanning, 0, total, None, "scanning files");

        let mut source_files = Vec::new();
        let mut test_files = Vec::new();
        for path in files {
            if !self.chunker.is_supported(path) {
                debug!("[INDEX] skipping unsupported file {}", path);
                continue;
            }
            match namespace_for(path) {
                ChunkNamespace::Source => source_files.push(path.clone()),
                ChunkNamespace::Test => test_files.push(path.clone()),
            }
        }

        let mut processed = 0;
        for (namespace, group) in [
            (ChunkNamespace::Source, source_files),
            (ChunkNamespace::Test, test_files),
        ] {
            for batch in group.chunks(self.config.batch_size.max(1)) {
                processed = self.index_batch(namespace, batch, processed, total).await?;
            }
        }

        {
            let mut project = self.project.lock().await;
            project.total_files = self.files.lock().await.len();
        }
        self.persist().await?;
        self.report(
            IndexingStage::Complete,
            total,
            total,
            None,
            "indexing complete",
        );
        info!("[INDEX] bulk pass finished ({} files submitted)", total);
        Ok(())
    }

    async fn index_batch(
        &self,
        namespace: ChunkNamespace,
        batch: &[String],
        mut processed: usize,
        total: usize,
    ) -> Result<usize> {
        let mut batch_chunks = Vec::new();
        // (path, stat, checksum, ids parsed from this file)
        let mut per_file: Vec<(String, FileStat, String, Vec<String>)> = Vec::new();
        for path in batch {
            processed += 1;
            let Ok(stat) = self.fs.stat(path).await else {
                warn!("[INDEX] cannot stat {}, skipping", path);
                continue;
            };
            let content = match self.fs.read_to_string(path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("[INDEX] cannot read {}, skipping: {}", path, e);
                    continue;
                }
            };
            let checksum = checksum_hex(&content);
            let chunks = self.chunker.parse(path, &content);
            let ids = chunks.iter().map(|c| c.id.clone()).collect();
            per_file.push((path.clone(), stat, checksum, ids));
            batch_chunks.extend(chunks);
            self.report(
                IndexingStage::Parsing,
                processed,
                total,
                Some(path.clone()),
                "parsing files",
            );
        }

        // Drop each file's previously stored ids before the new upsert;
        // renamed declarations change the chunk id.
        let old_ids: Vec<String> = {
            let files = self.files.lock().await;
            per_file
                .iter()
                .filter_map(|(path, ..)| files.get(path))
                .flat_map(|meta| meta.chunk_ids.iter().cloned())
                .collect()
        };
        if !old_ids.is_empty() {
            self.vectors.delete_chunks(&old_ids, namespace).await?;
        }

        self.report(
            IndexingStage::Embedding,
            processed,
            total,
            None,
            "embedding chunks",
        );
        let stored = self
            .vectors
            .upsert_chunks(&batch_chunks, namespace, self.config.batch_size)
            .await?;
        let stored_set: HashSet<&String> = stored.iter().collect();

        {
            let mut files = self.files.lock().await;
            for (path, stat, checksum, ids) in per_file {
                let chunk_ids = ids
                    .into_iter()
                    .filter(|id| stored_set.contains(id))
                    .collect();
                files.insert(
                    path.clone(),
                    IndexedFileMetadata {
                        file_path: path,
                        last_modified: stat.mtime_ms,
                        checksum,
                        size: stat.size,
                        chunk_ids,
                    },
                );
            }
        }
        self.persist().await?;
        self.report(
            IndexingStage::Storing,
            processed,
            total,
            None,
            "storing vectors",
        );
        Ok(processed)
    }

    /// Evict tracked files that no longer exist on disk and have been
    /// stale longer than the configured threshold. Returns the number of
    /// files evicted.
    pub async fn run_cleanup(&self) -> Result<usize> {
        let now = (self.clock)();
        let threshold_ms = (self.config.cleanup_threshold_days * 86_400_000) as i64;
        let tracked: Vec<(String, i64)> = {
            let files = self.files.lock().await;
            files
                .iter()
                .map(|(path, meta)| (path.clone(), meta.last_modified))
                .collect()
        };
        let mut evicted = 0;
        for (path, last_modified) in tracked {
            if self.fs.exists(&path).await {
                continue;
            }
            if now - last_modified > threshold_ms {
                self.handle_delete(&path).await?;
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!("[INDEX] cleanup evicted {} stale files", evicted);
        }
        Ok(evicted)
    }

    /// Start the daily cleanup sweep, if enabled.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        if !self.config.auto_cleanup {
            return;
        }
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(86_400));
            interval.tick().await; // first tick is immediate; skip it
            loop {
                interval.tick().await;
                if let Err(e) = manager.run_cleanup().await {
                    error!("[INDEX] cleanup sweep failed: {}", e);
                }
            }
        });
        let mut slot = self.cleanup_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Stop watch, cleanup and pending debounce tasks.
    pub fn stop(&self) {
        if let Some(task) = self
            .watch_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        if let Some(task) = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        let debouncers = std::mem::take(
            &mut *self.debouncers.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for debouncer in debouncers.into_values() {
            debouncer.cancel();
        }
    }

    fn begin_indexing(&self) -> bool {
        self.indexing_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn end_indexing(&self) {
        self.indexing_in_flight.store(false, Ordering::SeqCst);
    }

    fn report(
        &self,
        stage: IndexingStage,
        current: usize,
        total: usize,
        current_file: Option<String>,
        message: &str,
    ) {
        if !self.config.enable_progress_notifications {
            return;
        }
        if let Some(sink) = &self.progress {
            sink.notify(IndexingProgress {
                stage,
                current,
                total,
                current_file,
                message: message.to_string(),
            });
        }
    }
}

impl Drop for IndexManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn checksum_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| cdx_domain::error::Error::config(format!("bad glob {pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| cdx_domain::error::Error::config(format!("glob set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_hex_sha256() {
        let a = checksum_hex("hello");
        let b = checksum_hex("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, checksum_hex("hello!"));
    }

    #[test]
    fn glob_set_matches_includes_and_excludes() {
        let include = build_glob_set(&["**/*.rs".to_string()]).unwrap();
        let exclude = build_glob_set(&["**/target/**".to_string()]).unwrap();
        assert!(include.is_match("src/lib.rs"));
        assert!(!include.is_match("src/lib.py"));
        assert!(exclude.is_match("target/debug/build.rs"));
    }
}
