//! Checkpoint persistence for mirror synchronizers
//!
//! [`CheckpointLedger`] wraps any [`CheckpointStore`] with the policy the
//! synchronizers rely on:
//! - an absent, unreadable or unparsable checkpoint loads as [`NO_VERSION`]
//! - a failed write is logged and absorbed, never propagated
//! - writes for one mirror are applied in version order, even when detached
//!
//! # Example
//!
//! ```no_run
//! use fleetmirror::checkpoint::{CheckpointLedger, MemoryCheckpointStore};
//! use fleetmirror::SyncConfig;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(MemoryCheckpointStore::new().with_entry("mirror:trackers", "41"));
//! let ledger = CheckpointLedger::new(store, SyncConfig::default());
//!
//! assert_eq!(ledger.load("trackers").await, 41);
//! ledger.commit("trackers", 42).await;
//! # }
//! ```

use async_trait::async_trait;
use fleetmirror_core::{
    config::{CommitMode, SyncConfig},
    error::{MirrorError, Result},
    observe,
    traits::CheckpointStore,
    types::{Version, NO_VERSION},
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// In-process checkpoint store
///
/// Useful for tests and for deployments that accept replaying from scratch
/// after a restart. Reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<BTreeMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.lock().insert(key.into(), value.into());
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MirrorError::Store(format!("read of {} refused", key)));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MirrorError::Store(format!("write of {} refused", key)));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}

/// Result of asking the ledger to record a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// The store acknowledged the write
    Persisted,
    /// A newer version was already written for this mirror
    Superseded,
    /// The store rejected the write; the change may be replayed after a restart
    Failed,
    /// The write was handed to a background task
    Dispatched,
}

/// Last version written per mirror; held across the store call so writes
/// for one mirror never reorder.
type WriteSlot = Arc<tokio::sync::Mutex<Version>>;

/// Checkpoint policy layer shared by all synchronizers
#[derive(Clone)]
pub struct CheckpointLedger {
    store: Arc<dyn CheckpointStore>,
    config: SyncConfig,
    slots: Arc<Mutex<HashMap<String, WriteSlot>>>,
}

impl CheckpointLedger {
    pub fn new(store: Arc<dyn CheckpointStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Load the last committed version for `mirror`
    ///
    /// Fails open: any problem reading the checkpoint means "process
    /// everything from scratch".
    pub async fn load(&self, mirror: &str) -> Version {
        let key = self.config.checkpoint_key(mirror);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match raw.trim().parse::<Version>() {
                Ok(version) => version.max(NO_VERSION),
                Err(e) => {
                    tracing::warn!(
                        mirror,
                        value = %raw,
                        "Unparsable checkpoint, starting from scratch: {}",
                        e
                    );
                    NO_VERSION
                }
            },
            Ok(None) => {
                tracing::debug!(mirror, "No checkpoint recorded");
                NO_VERSION
            }
            Err(e) => {
                tracing::warn!(mirror, "Checkpoint read failed, starting from scratch: {}", e);
                NO_VERSION
            }
        }
    }

    /// Record `version` as the last fully processed version of `mirror`
    pub async fn commit(&self, mirror: &str, version: Version) -> CommitStatus {
        let slot = self.slot(mirror);
        let key = self.config.checkpoint_key(mirror);

        match self.config.commit_mode {
            CommitMode::Awaited => write_ordered(&*self.store, &slot, &key, version).await,
            CommitMode::Detached => {
                let store = self.store.clone();
                tokio::spawn(async move {
                    write_ordered(&*store, &slot, &key, version).await;
                });
                CommitStatus::Dispatched
            }
        }
    }

    fn slot(&self, mirror: &str) -> WriteSlot {
        self.slots
            .lock()
            .entry(mirror.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(NO_VERSION)))
            .clone()
    }
}

async fn write_ordered(
    store: &dyn CheckpointStore,
    slot: &tokio::sync::Mutex<Version>,
    key: &str,
    version: Version,
) -> CommitStatus {
    let mut last_written = slot.lock().await;
    if *last_written >= version {
        return CommitStatus::Superseded;
    }

    let start = Instant::now();
    match store.put(key, &version.to_string()).await {
        Ok(()) => {
            observe::record_checkpoint_write(start.elapsed(), true);
            *last_written = version;
            tracing::debug!(key, version, "Checkpoint committed");
            CommitStatus::Persisted
        }
        Err(e) => {
            observe::record_checkpoint_write(start.elapsed(), false);
            tracing::warn!(key, version, "Checkpoint write failed: {}", e);
            CommitStatus::Failed
        }
    }
}
