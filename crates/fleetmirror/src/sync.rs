//! Per-mirror version filtering and handler dispatch
//!
//! A [`MirrorSynchronizer`] sits between a [`Mirror`] and the domain code
//! that derives state from it. It loads the last committed version at
//! startup and afterwards only lets a change batch through when it moves the
//! mirror past that baseline:
//!
//! ```text
//! remote batch -> Mirror::apply (version advanced)
//!              -> baseline < mirror.version ?  no -> Duplicate (dropped)
//!                                              yes -> handlers -> baseline = version -> checkpoint
//! ```
//!
//! Changes delivered before the baseline is known are held back and
//! filtered once [`MirrorSynchronizer::initialize`] completes.

use crate::checkpoint::{CheckpointLedger, CommitStatus};
use crate::mirror::{Mirror, MirrorChange};
use fleetmirror_core::{
    error::{MirrorError, Result},
    observe,
    types::{ChangeKind, DocId, Document, Version},
};

/// Domain callbacks run once per accepted change
///
/// Handlers may be re-run with the same final mirror state after a crash
/// or a failed checkpoint write, so they must be idempotent.
pub trait MirrorHandler: Send {
    fn on_inserted(&mut self, _mirror: &Mirror, _document: &Document) -> Result<()> {
        Ok(())
    }

    fn on_updated(
        &mut self,
        _mirror: &Mirror,
        _document: &Document,
        _previous: Option<&Document>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_deleted(&mut self, _mirror: &Mirror, _id: &DocId, _previous: Option<&Document>) -> Result<()> {
        Ok(())
    }

    /// Called once after every change of an accepted batch was handled
    fn on_batch_end(&mut self, _mirror: &Mirror) -> Result<()> {
        Ok(())
    }
}

/// Handler for mirrors that are only read, never derived from
pub struct NoopHandler;

impl MirrorHandler for NoopHandler {}

/// Result of routing a change batch through a synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Handlers ran and the checkpoint was advanced to `version`
    Applied {
        version: Version,
        commit: CommitStatus,
    },
    /// Already processed: `version` does not exceed the baseline
    Duplicate { baseline: Version, version: Version },
    /// Held until the baseline has been loaded
    Deferred,
    /// A handler failed; baseline and checkpoint are unchanged
    HandlerFailed { version: Version },
    /// No synchronizer is registered for the collection
    Unrouted,
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Applied { .. } => "accepted",
            SyncOutcome::Duplicate { .. } => "duplicate",
            SyncOutcome::Deferred => "deferred",
            SyncOutcome::HandlerFailed { .. } => "handler_failed",
            SyncOutcome::Unrouted => "unrouted",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }
}

struct PendingBatch {
    changes: Vec<MirrorChange>,
    version: Version,
}

/// Version filter and handler set for one mirror
pub struct MirrorSynchronizer {
    name: String,
    baseline: Option<Version>,
    handler: Box<dyn MirrorHandler>,
    pending: Vec<PendingBatch>,
}

impl MirrorSynchronizer {
    pub fn new(name: impl Into<String>, handler: Box<dyn MirrorHandler>) -> Self {
        Self {
            name: name.into(),
            baseline: None,
            handler,
            pending: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last accepted version, `None` until initialized
    pub fn baseline(&self) -> Option<Version> {
        self.baseline
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    /// Number of batches waiting for initialization
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Load the baseline from the checkpoint store, then filter any batches
    /// that arrived while it was loading
    pub async fn initialize(
        &mut self,
        mirror: &Mirror,
        ledger: &CheckpointLedger,
    ) -> Result<Vec<SyncOutcome>> {
        if self.baseline.is_some() {
            return Err(MirrorError::InvalidState(format!(
                "synchronizer for '{}' already initialized",
                self.name
            )));
        }

        let baseline = ledger.load(&self.name).await;
        self.baseline = Some(baseline);
        tracing::info!(
            mirror = %self.name,
            baseline,
            pending = self.pending.len(),
            "Synchronizer initialized"
        );

        let pending = std::mem::take(&mut self.pending);
        let mut outcomes = Vec::with_capacity(pending.len());
        for batch in pending {
            outcomes.push(self.process(mirror, batch.changes, batch.version, ledger).await);
        }
        Ok(outcomes)
    }

    /// Route a batch of changes that has just been applied to `mirror`
    ///
    /// All changes in a batch share the mirror's post-batch version and are
    /// accepted or dropped together.
    pub async fn on_changes(
        &mut self,
        mirror: &Mirror,
        changes: Vec<MirrorChange>,
        ledger: &CheckpointLedger,
    ) -> SyncOutcome {
        let version = mirror.version();
        if self.baseline.is_none() {
            tracing::debug!(mirror = %self.name, version, "Deferring batch until initialized");
            self.pending.push(PendingBatch { changes, version });
            observe::record_change(&self.name, SyncOutcome::Deferred.label());
            return SyncOutcome::Deferred;
        }
        self.process(mirror, changes, version, ledger).await
    }

    async fn process(
        &mut self,
        mirror: &Mirror,
        changes: Vec<MirrorChange>,
        version: Version,
        ledger: &CheckpointLedger,
    ) -> SyncOutcome {
        let baseline = self.baseline.unwrap_or(version);
        let outcome = if baseline >= version {
            tracing::debug!(mirror = %self.name, baseline, version, "Dropping duplicate batch");
            SyncOutcome::Duplicate { baseline, version }
        } else if let Err(e) = self.dispatch(mirror, &changes) {
            tracing::warn!(mirror = %self.name, version, "Handler failed: {}", e);
            SyncOutcome::HandlerFailed { version }
        } else {
            self.baseline = Some(version);
            let commit = ledger.commit(&self.name, version).await;
            SyncOutcome::Applied { version, commit }
        };
        observe::record_change(&self.name, outcome.label());
        outcome
    }

    fn dispatch(&mut self, mirror: &Mirror, changes: &[MirrorChange]) -> Result<()> {
        for change in changes {
            match (change.kind, change.current.as_ref()) {
                (ChangeKind::Inserted, Some(doc)) => self.handler.on_inserted(mirror, doc)?,
                (ChangeKind::Updated, Some(doc)) => {
                    self.handler
                        .on_updated(mirror, doc, change.previous.as_ref())?
                }
                (ChangeKind::Deleted, _) => {
                    self.handler
                        .on_deleted(mirror, &change.id, change.previous.as_ref())?
                }
                (kind, None) => {
                    return Err(MirrorError::InvalidState(format!(
                        "{} change for {} carries no document",
                        kind, change.id
                    )))
                }
            }
        }
        self.handler.on_batch_end(mirror)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use fleetmirror_core::{config::SyncConfig, types::RemoteChange};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        batches: Arc<AtomicUsize>,
        fail: bool,
    }

    impl MirrorHandler for CountingHandler {
        fn on_inserted(&mut self, _mirror: &Mirror, _document: &Document) -> Result<()> {
            if self.fail {
                return Err(MirrorError::Handler("boom".into()));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_updated(
            &mut self,
            _mirror: &Mirror,
            _document: &Document,
            _previous: Option<&Document>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_batch_end(&mut self, _mirror: &Mirror) -> Result<()> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup(entries: &[(&str, &str)]) -> (Arc<MemoryCheckpointStore>, CheckpointLedger) {
        let mut store = MemoryCheckpointStore::new();
        for (k, v) in entries {
            store = store.with_entry(*k, *v);
        }
        let store = Arc::new(store);
        let ledger = CheckpointLedger::new(store.clone(), SyncConfig::default());
        (store, ledger)
    }

    fn counting(fail: bool) -> (Arc<AtomicUsize>, Box<dyn MirrorHandler>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = Box::new(CountingHandler {
            calls: calls.clone(),
            batches: Arc::new(AtomicUsize::new(0)),
            fail,
        });
        (calls, handler)
    }

    fn insert(mirror: &mut Mirror, id: &str, version: Version) -> Vec<MirrorChange> {
        vec![mirror.apply(&RemoteChange::inserted(
            "trackers",
            Document::new(id),
            version,
        ))]
    }

    #[tokio::test]
    async fn test_accepts_only_versions_past_checkpoint() {
        let (store, ledger) = setup(&[("mirror:trackers", "41")]);
        let (calls, handler) = counting(false);
        let mut mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", handler);
        sync.initialize(&mirror, &ledger).await.unwrap();
        assert_eq!(sync.baseline(), Some(41));

        let changes = insert(&mut mirror, "t1", 41);
        let outcome = sync.on_changes(&mirror, changes, &ledger).await;
        assert_eq!(
            outcome,
            SyncOutcome::Duplicate {
                baseline: 41,
                version: 41
            }
        );

        let changes = insert(&mut mirror, "t2", 42);
        let outcome = sync.on_changes(&mirror, changes, &ledger).await;
        assert!(outcome.is_applied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.snapshot().get("mirror:trackers").map(String::as_str),
            Some("42")
        );
    }

    #[tokio::test]
    async fn test_batch_is_accepted_together() {
        let (_store, ledger) = setup(&[]);
        let (calls, handler) = counting(false);
        let mut mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", handler);
        sync.initialize(&mirror, &ledger).await.unwrap();

        let mut changes = insert(&mut mirror, "t1", 3);
        changes.extend(insert(&mut mirror, "t2", 3));
        let outcome = sync.on_changes(&mirror, changes, &ledger).await;
        assert!(outcome.is_applied());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_end_runs_once_per_accepted_batch() {
        let (_store, ledger) = setup(&[]);
        let batches = Arc::new(AtomicUsize::new(0));
        let handler = Box::new(CountingHandler {
            calls: Arc::new(AtomicUsize::new(0)),
            batches: batches.clone(),
            fail: false,
        });
        let mut mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", handler);
        sync.initialize(&mirror, &ledger).await.unwrap();

        let mut changes = insert(&mut mirror, "t1", 3);
        changes.extend(insert(&mut mirror, "t2", 3));
        changes.extend(insert(&mut mirror, "t3", 3));
        assert!(sync.on_changes(&mirror, changes, &ledger).await.is_applied());
        assert_eq!(batches.load(Ordering::SeqCst), 1);

        let changes = insert(&mut mirror, "t1", 3);
        sync.on_changes(&mirror, changes, &ledger).await;
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deferred_until_initialized() {
        let (_store, ledger) = setup(&[("mirror:trackers", "5")]);
        let (calls, handler) = counting(false);
        let mut mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", handler);

        let changes = insert(&mut mirror, "t1", 4);
        assert_eq!(
            sync.on_changes(&mirror, changes, &ledger).await,
            SyncOutcome::Deferred
        );
        let changes = insert(&mut mirror, "t2", 6);
        assert_eq!(
            sync.on_changes(&mirror, changes, &ledger).await,
            SyncOutcome::Deferred
        );
        assert_eq!(sync.pending(), 2);

        let outcomes = sync.initialize(&mirror, &ledger).await.unwrap();
        assert_eq!(
            outcomes[0],
            SyncOutcome::Duplicate {
                baseline: 5,
                version: 4
            }
        );
        assert!(outcomes[1].is_applied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_baseline() {
        let (store, ledger) = setup(&[]);
        let (_calls, handler) = counting(true);
        let mut mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", handler);
        sync.initialize(&mirror, &ledger).await.unwrap();

        let changes = insert(&mut mirror, "t1", 1);
        let outcome = sync.on_changes(&mirror, changes, &ledger).await;
        assert_eq!(outcome, SyncOutcome::HandlerFailed { version: 1 });
        assert_eq!(sync.baseline(), Some(-1));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_double_initialize_rejected() {
        let (_store, ledger) = setup(&[]);
        let mirror = Mirror::new("trackers");
        let mut sync = MirrorSynchronizer::new("trackers", Box::new(NoopHandler));
        sync.initialize(&mirror, &ledger).await.unwrap();
        assert!(matches!(
            sync.initialize(&mirror, &ledger).await,
            Err(MirrorError::InvalidState(_))
        ));
    }
}
