//! Configuration for CaskKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Main configuration for a CaskKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── LOCK                          (exclusive handle lock)
    ///     ├── 00000000000000000001.data     (sealed segment)
    ///     ├── 00000000000000000002.data     (active segment)
    ///     └── compact.tmp                   (only while compacting)
    pub data_dir: PathBuf,

    /// Size at which the active segment is sealed and a new one is opened
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the active segment
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// When compaction runs without an explicit `compact()` call
    pub compaction_policy: CompactionPolicy,
}

/// Segment sync strategy
///
/// Every put/delete flushes its bytes to the OS before returning. The
/// strategy only decides when a storage-level sync is issued on top of that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncStrategy {
    /// Flush only (survives a process crash, not a power loss)
    Flush,

    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N writes (balanced durability/performance)
    EveryNWrites { count: usize },
}

/// Automatic compaction trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompactionPolicy {
    /// Only compact when `Engine::compact` is called
    Manual,

    /// Compact after a write once stale bytes exceed both thresholds
    DeadBytes {
        /// Minimum absolute number of stale bytes
        min_dead_bytes: u64,
        /// Minimum fraction of all segment bytes that are stale
        min_dead_ratio: f64,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./caskkv_data"),
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            sync_strategy: SyncStrategy::Flush,
            compaction_policy: CompactionPolicy::Manual,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values are usable before opening an engine
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(CaskError::Config(
                "max_segment_size must be greater than 0".to_string(),
            ));
        }

        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(CaskError::Config(
                "EveryNWrites count must be greater than 0".to_string(),
            ));
        }

        if let CompactionPolicy::DeadBytes { min_dead_ratio, .. } = self.compaction_policy {
            if !(min_dead_ratio > 0.0 && min_dead_ratio <= 1.0) {
                return Err(CaskError::Config(format!(
                    "min_dead_ratio must be in (0.0, 1.0], got {}",
                    min_dead_ratio
                )));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all segments)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation size (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the automatic compaction policy
    pub fn compaction_policy(mut self, policy: CompactionPolicy) -> Self {
        self.config.compaction_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
