use fleetmirror_core::types::{ChangeKind, DocId, Document, RemoteChange, Version, NO_VERSION};
use std::collections::BTreeMap;

/// What applying one remote change did to a mirror
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorChange {
    pub kind: ChangeKind,
    pub id: DocId,
    /// Document after the change (`None` for deletes)
    pub current: Option<Document>,
    /// Document before the change, if it existed
    pub previous: Option<Document>,
}

/// In-memory replica of one named remote collection
///
/// Contents are exactly the result of applying every change up to
/// `version` in source commit order. The mirror is never persisted; it is
/// rebuilt from the remote source on restart.
#[derive(Debug, Clone)]
pub struct Mirror {
    name: String,
    documents: BTreeMap<DocId, Document>,
    version: Version,
    revision: u64,
}

impl Mirror {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: BTreeMap::new(),
            version: NO_VERSION,
            revision: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection version of the last applied change
    pub fn version(&self) -> Version {
        self.version
    }

    /// Local mutation counter, bumped on every applied change or snapshot.
    /// Derived views compare it to detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &DocId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Replace the contents with an initial snapshot taken at `version`
    pub fn load_snapshot(&mut self, documents: impl IntoIterator<Item = Document>, version: Version) {
        self.documents = documents
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();
        self.version = self.version.max(version);
        self.revision += 1;
    }

    /// Apply a remote change and advance the version
    ///
    /// Inserts replace any existing document. Updates merge the delivered
    /// fields into the existing document, removing fields delivered as
    /// `null`; an update for an unknown id creates the document. Deleting an
    /// unknown id leaves the contents unchanged.
    pub fn apply(&mut self, change: &RemoteChange) -> MirrorChange {
        let id = change.id.clone();
        let (current, previous) = match change.kind {
            ChangeKind::Inserted => {
                let doc = change.document();
                let previous = self.documents.insert(id.clone(), doc.clone());
                (Some(doc), previous)
            }
            ChangeKind::Updated => {
                let previous = self.documents.get(&id).cloned();
                let mut doc = previous.clone().unwrap_or_else(|| Document::new(id.clone()));
                for (name, value) in &change.fields {
                    if value.is_null() {
                        doc.fields.remove(name);
                    } else {
                        doc.fields.insert(name.clone(), value.clone());
                    }
                }
                self.documents.insert(id.clone(), doc.clone());
                (Some(doc), previous)
            }
            ChangeKind::Deleted => (None, self.documents.remove(&id)),
        };

        self.version = self.version.max(change.version);
        self.revision += 1;

        MirrorChange {
            kind: change.kind,
            id,
            current,
            previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn tracker(id: &str, vid: &str) -> Document {
        Document::new(id).with_field("vID", vid)
    }

    #[test]
    fn test_insert_update_delete() {
        let mut mirror = Mirror::new("trackers");
        assert_eq!(mirror.version(), NO_VERSION);

        let inserted = mirror.apply(&RemoteChange::inserted("trackers", tracker("t1", "A"), 1));
        assert_eq!(inserted.kind, ChangeKind::Inserted);
        assert!(inserted.previous.is_none());
        assert_eq!(mirror.version(), 1);

        let update = Document::new("t1").with_field("name", "van");
        let updated = mirror.apply(&RemoteChange::updated("trackers", update, 2));
        assert_eq!(updated.previous, Some(tracker("t1", "A")));
        let current = updated.current.unwrap();
        assert_eq!(current.get_str("vID"), Some("A"));
        assert_eq!(current.get_str("name"), Some("van"));

        let deleted = mirror.apply(&RemoteChange::deleted("trackers", "t1", 3));
        assert!(deleted.current.is_none());
        assert_eq!(deleted.previous.unwrap().get_str("name"), Some("van"));
        assert!(mirror.is_empty());
        assert_eq!(mirror.version(), 3);
    }

    #[test]
    fn test_update_clears_null_fields() {
        let mut mirror = Mirror::new("trackers");
        mirror.apply(&RemoteChange::inserted(
            "trackers",
            tracker("t1", "A").with_field("referenceId", "r1"),
            1,
        ));
        mirror.apply(&RemoteChange::updated(
            "trackers",
            Document::new("t1").with_field("referenceId", Value::Null),
            2,
        ));
        assert!(mirror.get(&DocId::from("t1")).unwrap().get("referenceId").is_none());
    }

    #[test]
    fn test_update_of_unknown_id_creates_document() {
        let mut mirror = Mirror::new("trackers");
        let change = mirror.apply(&RemoteChange::updated("trackers", tracker("t9", "Z"), 4));
        assert!(change.previous.is_none());
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_delete_of_unknown_id_is_noop() {
        let mut mirror = Mirror::new("trackers");
        let change = mirror.apply(&RemoteChange::deleted("trackers", "missing", 2));
        assert!(change.current.is_none());
        assert!(change.previous.is_none());
        assert_eq!(mirror.version(), 2);
    }

    #[test]
    fn test_version_never_decreases() {
        let mut mirror = Mirror::new("trackers");
        mirror.apply(&RemoteChange::inserted("trackers", tracker("t1", "A"), 10));
        mirror.apply(&RemoteChange::inserted("trackers", tracker("t2", "B"), 7));
        assert_eq!(mirror.version(), 10);
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_snapshot_and_revision() {
        let mut mirror = Mirror::new("trackers");
        mirror.load_snapshot(vec![tracker("t1", "A"), tracker("t2", "B")], 5);
        assert_eq!(mirror.version(), 5);
        assert_eq!(mirror.revision(), 1);

        let ids: Vec<_> = mirror.documents().map(|d| d.id.to_string()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(mirror.get(&DocId::from("t2")).unwrap().get_str("vID"), Some("B"));
    }
}
