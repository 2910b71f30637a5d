//! Indexing configuration schema.
//!
//! The struct is pure serde; layered loading (file, environment,
//! defaults) lives in the infrastructure crate.

use crate::entities::IndexingStrategy;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Recognized indexing options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexingConfig {
    /// React to file-watch events at all
    pub auto_indexing: bool,
    /// Re-indexing policy
    pub strategy: IndexingStrategy,
    /// Debounce delay for change events, milliseconds
    pub indexing_delay_ms: u64,
    /// Ceiling on the number of tracked files
    pub max_index_size: usize,
    /// Chunks embedded and upserted per backend call
    pub batch_size: usize,
    /// Glob patterns a path must match to be watched
    pub include_patterns: Vec<String>,
    /// Glob patterns excluding paths from watching
    pub exclude_patterns: Vec<String>,
    /// Run the periodic stale-file sweep
    pub auto_cleanup: bool,
    /// Days a tracked file may be missing from disk before eviction
    pub cleanup_threshold_days: u64,
    /// Emit progress updates during bulk indexing
    pub enable_progress_notifications: bool,
    /// Smart strategy: tracked-file fraction of `max_index_size` beyond
    /// which a single-file update escalates to a full re-index
    pub full_reindex_capacity_ratio: f64,
    /// Smart strategy: fraction of tracked files modified inside the
    /// recent-change window beyond which a full re-index is triggered
    pub recent_change_ratio: f64,
    /// Smart strategy: recent-change window, seconds
    pub recent_change_window_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            auto_indexing: true,
            strategy: IndexingStrategy::Smart,
            indexing_delay_ms: 2_000,
            max_index_size: 10_000,
            batch_size: crate::constants::DEFAULT_BATCH_SIZE,
            include_patterns: vec!["**/*".to_string()],
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
            auto_cleanup: true,
            cleanup_threshold_days: 7,
            enable_progress_notifications: true,
            full_reindex_capacity_ratio: 0.8,
            recent_change_ratio: 0.3,
            recent_change_window_secs: 60,
        }
    }
}

impl IndexingConfig {
    /// Validate option ranges before the config is wired into services.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be positive"));
        }
        if self.max_index_size == 0 {
            return Err(Error::config("max_index_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.full_reindex_capacity_ratio) {
            return Err(Error::config(
                "full_reindex_capacity_ratio must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.recent_change_ratio) {
            return Err(Error::config("recent_change_ratio must be within [0, 1]"));
        }
        Ok(())
    }
}
