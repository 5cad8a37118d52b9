use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sync mode for LMDB durability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncMode {
    /// Full durability (fsync on every commit)
    #[default]
    Full,
    /// Don't sync metadata (faster, still durable in most cases)
    NoMetaSync,
    /// No sync (fastest, but data loss on crash)
    NoSync,
}

/// Configuration for the LMDB checkpoint store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmdbConfig {
    /// Directory holding the LMDB environment
    /// Default: "./data/checkpoints"
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Memory map size in bytes
    /// Default: 64MB
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    #[serde(default)]
    pub sync_mode: SyncMode,
}

fn default_path() -> PathBuf {
    PathBuf::from("./data/checkpoints")
}

fn default_map_size() -> usize {
    64 * 1024 * 1024 // 64MB
}

impl Default for LmdbConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            map_size: default_map_size(),
            sync_mode: SyncMode::default(),
        }
    }
}

impl LmdbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_map_size(mut self, size: usize) -> Self {
        self.map_size = size;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }
}
