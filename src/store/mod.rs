//! Hierarchical document store interface.
//!
//! Paths alternate collection and document segments (`Rutas/ruta7/RutaRecorrido/0`).
//! References are stored as plain paths and resolved through the store.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field map of a single document.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Field '{field}' of {path} is not an array")]
    NotAnArray { path: String, field: String },
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Path to a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    /// A document of a top-level collection.
    pub fn root(collection: &str, id: &str) -> Self {
        Self(format!("{collection}/{id}"))
    }

    /// A document of a sub-collection of this document.
    pub fn child(&self, collection: &str, id: &str) -> Self {
        Self(format!("{}/{collection}/{id}", self.0))
    }

    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{name}", self.0))
    }

    /// The collection this document lives in.
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_ref(&self) -> DocRef {
        DocRef {
            id: self.id().to_string(),
            path: self.clone(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn doc(&self, id: &str) -> DocPath {
        DocPath(format!("{}/{id}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to another document: its identifier plus where to find it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub id: String,
    pub path: DocPath,
}

/// A document field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Reference(DocRef),
    Timestamp(DateTime<Utc>),
    /// Replaced by the store's clock when written.
    ServerTimestamp,
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&DocRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Null, empty text and empty arrays are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Reference(r) => f.write_str(r.path.as_str()),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            Value::ServerTimestamp => f.write_str("SERVER_TIMESTAMP"),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DocRef> for Value {
    fn from(value: DocRef) -> Self {
        Value::Reference(value)
    }
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the document or merge `fields` into it; other fields are kept.
    async fn upsert_merge(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Add `value` to the array `field` unless already present, creating the
    /// document and the field when missing.
    async fn array_union_merge(
        &self,
        path: &DocPath,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Write the full document `key` of `collection`, replacing any previous one.
    async fn set_indexed(
        &self,
        collection: &CollectionPath,
        key: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    async fn get(&self, path: &DocPath) -> Result<Option<Fields>, StoreError>;

    /// Documents directly under `collection`, in key order.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_compose() {
        let locality = DocPath::root("Clientes", "A").child("Localidades", "Z1");
        assert_eq!(locality.as_str(), "Clientes/A/Localidades/Z1");
        assert_eq!(locality.id(), "Z1");
        assert_eq!(locality.parent().as_str(), "Clientes/A/Localidades");

        let rows = DocPath::root("Rutas", "r7").collection("RutaRecorrido");
        assert_eq!(rows.doc("3").as_str(), "Rutas/r7/RutaRecorrido/3");
        assert_eq!(rows.doc("3").parent(), rows);
    }

    #[test]
    fn references_carry_id_and_path() {
        let r = DocPath::root("Rutas", "r7").to_ref();
        assert_eq!(r.id, "r7");
        assert_eq!(Value::from(r).to_string(), "Rutas/r7");
    }
}
