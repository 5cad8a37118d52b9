//! Short device identifier -> canonical object identifier
//!
//! The index is derived entirely from a mirror and is always rebuilt from
//! scratch, never patched. [`IndexingHandler`] rebuilds it once per
//! accepted batch; readers can also check [`CrossReferenceIndex::is_current`]
//! and rebuild when the mirror moved on without the handler running (for
//! example while replaying already-checkpointed versions).

use crate::mirror::Mirror;
use crate::sync::MirrorHandler;
use fleetmirror_core::{
    error::Result,
    types::{DocId, Document},
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Index shared between the synchronizer that maintains it and its readers
pub type SharedIndex = Arc<RwLock<CrossReferenceIndex>>;

#[derive(Debug, Clone, Default)]
pub struct CrossReferenceIndex {
    by_short_id: HashMap<String, DocId>,
    source_revision: Option<u64>,
}

impl CrossReferenceIndex {
    /// Build a fresh index from every document carrying `short_id_field`
    ///
    /// When two documents claim the same short id the later one (in mirror
    /// order) wins.
    pub fn rebuild(mirror: &Mirror, short_id_field: &str) -> Self {
        let mut by_short_id = HashMap::with_capacity(mirror.len());
        for doc in mirror.documents() {
            let Some(short_id) = short_id_of(doc, short_id_field) else {
                continue;
            };
            if let Some(prev) = by_short_id.insert(short_id.clone(), doc.id.clone()) {
                tracing::debug!(
                    mirror = mirror.name(),
                    short_id = %short_id,
                    replaced = %prev,
                    by = %doc.id,
                    "Duplicate short id"
                );
            }
        }
        Self {
            by_short_id,
            source_revision: Some(mirror.revision()),
        }
    }

    /// Resolve a short id; `None` means an unknown entity
    pub fn lookup(&self, short_id: &str) -> Option<&DocId> {
        self.by_short_id.get(short_id)
    }

    /// Whether the index reflects the mirror's current contents
    pub fn is_current(&self, mirror: &Mirror) -> bool {
        self.source_revision == Some(mirror.revision())
    }

    pub fn len(&self) -> usize {
        self.by_short_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_short_id.is_empty()
    }
}

fn short_id_of(doc: &Document, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Domain handler that keeps a [`SharedIndex`] in step with its mirror
pub struct IndexingHandler {
    index: SharedIndex,
    short_id_field: String,
}

impl IndexingHandler {
    pub fn new(index: SharedIndex, short_id_field: impl Into<String>) -> Self {
        Self {
            index,
            short_id_field: short_id_field.into(),
        }
    }

    fn refresh(&self, mirror: &Mirror) {
        let rebuilt = CrossReferenceIndex::rebuild(mirror, &self.short_id_field);
        *self.index.write() = rebuilt;
    }
}

impl MirrorHandler for IndexingHandler {
    fn on_batch_end(&mut self, mirror: &Mirror) -> Result<()> {
        self.refresh(mirror);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmirror_core::types::RemoteChange;

    fn trackers() -> Mirror {
        let mut mirror = Mirror::new("trackers");
        mirror.load_snapshot(
            vec![
                Document::new("obj-1").with_field("vID", "A"),
                Document::new("obj-2").with_field("vID", 77),
                Document::new("obj-3"),
                Document::new("obj-4").with_field("vID", ""),
            ],
            1,
        );
        mirror
    }

    #[test]
    fn test_rebuild_and_lookup() {
        let mirror = trackers();
        let index = CrossReferenceIndex::rebuild(&mirror, "vID");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("A"), Some(&DocId::from("obj-1")));
        assert_eq!(index.lookup("77"), Some(&DocId::from("obj-2")));
        assert_eq!(index.lookup("missing"), None);
    }

    #[test]
    fn test_staleness_follows_mirror_revision() {
        let mut mirror = trackers();
        let index = CrossReferenceIndex::rebuild(&mirror, "vID");
        assert!(index.is_current(&mirror));

        mirror.apply(&RemoteChange::deleted("trackers", "obj-1", 2));
        assert!(!index.is_current(&mirror));
        assert!(!CrossReferenceIndex::default().is_current(&mirror));
    }

    #[test]
    fn test_handler_rebuilds_shared_index() {
        let index: SharedIndex = Arc::new(RwLock::new(CrossReferenceIndex::default()));
        let mut handler = IndexingHandler::new(index.clone(), "vID");
        let mut mirror = trackers();

        mirror.apply(&RemoteChange::inserted(
            "trackers",
            Document::new("obj-9").with_field("vID", "Z"),
            2,
        ));
        handler.on_batch_end(&mirror).unwrap();

        let guard = index.read();
        assert_eq!(guard.lookup("Z"), Some(&DocId::from("obj-9")));
        assert!(guard.is_current(&mirror));
    }
}
