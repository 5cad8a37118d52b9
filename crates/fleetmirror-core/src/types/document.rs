use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable identifier of a document within its collection.
///
/// Remote collections key documents either by string or by integer; both are
/// kept distinct so `"7"` and `7` never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocId {
    Num(i64),
    Str(String),
}

impl DocId {
    /// Interpret a JSON value as an identifier (strings and integers only)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(DocId::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(DocId::Num),
            _ => None,
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Num(n) => write!(f, "{}", n),
            DocId::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId::Str(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId::Str(s)
    }
}

impl From<i64> for DocId {
    fn from(n: i64) -> Self {
        DocId::Num(n)
    }
}

/// A record owned by a mirror: identifier plus collection-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_fields(id: impl Into<DocId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Read a field that holds a reference to another document
    pub fn get_doc_id(&self, name: &str) -> Option<DocId> {
        self.fields.get(name).and_then(DocId::from_value)
    }
}
