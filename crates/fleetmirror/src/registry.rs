use crate::checkpoint::CheckpointLedger;
use crate::mirror::Mirror;
use crate::sync::{MirrorHandler, MirrorSynchronizer, SyncOutcome};
use fleetmirror_core::{
    error::{MirrorError, Result},
    observe,
    types::{Document, RemoteChange, Version},
};
use std::collections::HashMap;

struct MirrorEntry {
    mirror: Mirror,
    sync: MirrorSynchronizer,
}

/// Name-keyed registry of mirrors and their synchronizers
///
/// Each registered collection gets its own [`Mirror`], baseline and handler
/// set. All synchronizers share one [`CheckpointLedger`], keyed per mirror.
pub struct SyncRegistry {
    ledger: CheckpointLedger,
    entries: HashMap<String, MirrorEntry>,
}

impl SyncRegistry {
    pub fn new(ledger: CheckpointLedger) -> Self {
        Self {
            ledger,
            entries: HashMap::new(),
        }
    }

    pub fn ledger(&self) -> &CheckpointLedger {
        &self.ledger
    }

    /// Register a collection with its domain handler
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn MirrorHandler>,
    ) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(MirrorError::InvalidState(format!(
                "Mirror '{}' already registered",
                name
            )));
        }
        let entry = MirrorEntry {
            mirror: Mirror::new(name.clone()),
            sync: MirrorSynchronizer::new(name.clone(), handler),
        };
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Registered collection names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn mirror(&self, name: &str) -> Option<&Mirror> {
        self.entries.get(name).map(|e| &e.mirror)
    }

    pub fn baseline(&self, name: &str) -> Option<Version> {
        self.entries.get(name).and_then(|e| e.sync.baseline())
    }

    pub fn is_initialized(&self) -> bool {
        self.entries.values().all(|e| e.sync.is_initialized())
    }

    /// Load the checkpoint for one mirror
    pub async fn initialize(&mut self, name: &str) -> Result<Vec<SyncOutcome>> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| MirrorError::NotFound(format!("Mirror '{}'", name)))?;
        entry.sync.initialize(&entry.mirror, &self.ledger).await
    }

    /// Load checkpoints for every mirror that has not been initialized yet
    pub async fn initialize_all(&mut self) -> Result<Vec<SyncOutcome>> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.sync.is_initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();

        let mut outcomes = Vec::new();
        for name in names {
            outcomes.extend(self.initialize(&name).await?);
        }
        Ok(outcomes)
    }

    /// Seed a mirror with its initial contents
    pub fn load_snapshot(
        &mut self,
        name: &str,
        documents: impl IntoIterator<Item = Document>,
        version: Version,
    ) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| MirrorError::NotFound(format!("Mirror '{}'", name)))?;
        entry.mirror.load_snapshot(documents, version);
        Ok(())
    }

    /// Apply a single remote change
    pub async fn apply(&mut self, change: RemoteChange) -> Result<SyncOutcome> {
        self.apply_batch(vec![change]).await
    }

    /// Apply a batch of changes committed together at the source
    ///
    /// Every change is applied to the mirror first; the synchronizer then
    /// judges the batch once, against the mirror's post-batch version.
    pub async fn apply_batch(&mut self, changes: Vec<RemoteChange>) -> Result<SyncOutcome> {
        let collection = match changes.first() {
            Some(first) => first.collection.clone(),
            None => {
                return Err(MirrorError::InvalidState(
                    "Change batch must not be empty".into(),
                ))
            }
        };
        if changes.iter().any(|c| c.collection != collection) {
            return Err(MirrorError::InvalidState(format!(
                "Change batch for '{}' mixes collections",
                collection
            )));
        }

        let Some(entry) = self.entries.get_mut(&collection) else {
            tracing::debug!(collection = %collection, "No mirror registered, dropping batch");
            observe::record_change(&collection, SyncOutcome::Unrouted.label());
            return Ok(SyncOutcome::Unrouted);
        };

        let applied = changes
            .iter()
            .map(|change| entry.mirror.apply(change))
            .collect();
        Ok(entry
            .sync
            .on_changes(&entry.mirror, applied, &self.ledger)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::sync::NoopHandler;
    use fleetmirror_core::config::SyncConfig;
    use std::sync::Arc;

    fn registry() -> SyncRegistry {
        let store = Arc::new(MemoryCheckpointStore::new().with_entry("mirror:trackers", "2"));
        SyncRegistry::new(CheckpointLedger::new(store, SyncConfig::default()))
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let mut registry = registry();
        registry.register("trackers", Box::new(NoopHandler)).unwrap();
        assert!(registry.register("trackers", Box::new(NoopHandler)).is_err());
    }

    #[tokio::test]
    async fn test_unrouted_collection() {
        let mut registry = registry();
        let outcome = registry
            .apply(RemoteChange::inserted("unknown", Document::new("x"), 1))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Unrouted);
    }

    #[tokio::test]
    async fn test_initialize_all_uses_independent_keys() {
        let mut registry = registry();
        registry.register("trackers", Box::new(NoopHandler)).unwrap();
        registry.register("references", Box::new(NoopHandler)).unwrap();
        assert!(!registry.is_initialized());

        registry.initialize_all().await.unwrap();
        assert!(registry.is_initialized());
        assert_eq!(registry.baseline("trackers"), Some(2));
        assert_eq!(registry.baseline("references"), Some(-1));
        assert_eq!(registry.names(), vec!["references", "trackers"]);
    }

    #[tokio::test]
    async fn test_mirror_tracks_changes_even_when_duplicate() {
        let mut registry = registry();
        registry.register("trackers", Box::new(NoopHandler)).unwrap();
        registry.initialize_all().await.unwrap();

        let outcome = registry
            .apply(RemoteChange::inserted("trackers", Document::new("t1"), 1))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Duplicate { .. }));
        assert_eq!(registry.mirror("trackers").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_batch_rejected() {
        let mut registry = registry();
        let result = registry
            .apply_batch(vec![
                RemoteChange::inserted("trackers", Document::new("t1"), 1),
                RemoteChange::inserted("references", Document::new("r1"), 1),
            ])
            .await;
        assert!(matches!(result, Err(MirrorError::InvalidState(_))));
        assert!(registry.apply_batch(Vec::new()).await.is_err());
    }
}
