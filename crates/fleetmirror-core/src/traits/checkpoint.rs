use crate::error::{MirrorError, Result};
use async_trait::async_trait;

/// Durable string key/value store holding mirror checkpoints
///
/// Implement this trait to persist checkpoints in a different backend
/// (LMDB, a remote KV service, etc.). Writes to different keys must be
/// independent: one mirror's checkpoint never waits on another's.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// List every stored entry (optional)
    async fn list(&self) -> Result<Vec<(String, String)>> {
        Err(MirrorError::Config(
            "List operation not supported by this checkpoint store".to_string(),
        ))
    }

    /// Get the store type identifier
    fn store_type(&self) -> &str;
}
