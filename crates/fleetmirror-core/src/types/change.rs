use super::document::{DocId, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Collection version reported by the remote source.
///
/// Monotonically non-decreasing per collection.
pub type Version = i64;

/// Baseline used when no checkpoint has been recorded
pub const NO_VERSION: Version = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw change as delivered by the remote source, before it is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub collection: String,
    pub kind: ChangeKind,
    pub id: DocId,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Collection version after this change is applied
    pub version: Version,
}

impl RemoteChange {
    pub fn inserted(collection: impl Into<String>, doc: Document, version: Version) -> Self {
        Self::from_document(collection, ChangeKind::Inserted, doc, version)
    }

    pub fn updated(collection: impl Into<String>, doc: Document, version: Version) -> Self {
        Self::from_document(collection, ChangeKind::Updated, doc, version)
    }

    pub fn deleted(collection: impl Into<String>, id: impl Into<DocId>, version: Version) -> Self {
        Self {
            collection: collection.into(),
            kind: ChangeKind::Deleted,
            id: id.into(),
            fields: Map::new(),
            version,
        }
    }

    fn from_document(
        collection: impl Into<String>,
        kind: ChangeKind,
        doc: Document,
        version: Version,
    ) -> Self {
        Self {
            collection: collection.into(),
            kind,
            id: doc.id,
            fields: doc.fields,
            version,
        }
    }

    /// The document carried by an insert or update
    pub fn document(&self) -> Document {
        Document::with_fields(self.id.clone(), self.fields.clone())
    }
}
