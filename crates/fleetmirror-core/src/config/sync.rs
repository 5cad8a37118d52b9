use serde::{Deserialize, Serialize};

/// When a checkpoint write happens relative to acknowledging a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Await the store write before the change counts as processed.
    /// A crash can only replay the change whose write was in flight.
    #[default]
    Awaited,
    /// Spawn the store write and continue immediately.
    /// Handlers must be idempotent: a crash may replay several versions.
    Detached,
}

/// Configuration for mirror synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Prefix prepended to a mirror name to form its checkpoint key
    /// Default: "mirror:"
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Default: awaited
    #[serde(default)]
    pub commit_mode: CommitMode,
}

fn default_key_prefix() -> String {
    "mirror:".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            commit_mode: CommitMode::default(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_commit_mode(mut self, mode: CommitMode) -> Self {
        self.commit_mode = mode;
        self
    }

    /// Checkpoint key for a mirror
    pub fn checkpoint_key(&self, mirror: &str) -> String {
        format!("{}{}", self.key_prefix, mirror)
    }
}
