use super::{CollectionPath, DocPath, Document, DocumentStore, Fields, StoreError, Value};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process document store.
///
/// Documents are kept in a single ordered map keyed by full path, so listing a
/// collection yields keys in lexicographic order. State can be saved to and
/// loaded from a JSON snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<DocPath, Fields>>,
}

fn resolve_server_timestamps(fields: Fields) -> Fields {
    let now = Utc::now();
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::ServerTimestamp => Value::Timestamp(now),
                other => other,
            };
            (name, value)
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryStore::save`]; a missing file yields an empty store.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let docs: BTreeMap<DocPath, Fields> = serde_json::from_slice(&bytes)?;
                debug!(documents = docs.len(), path = %path.display(), "loaded snapshot");
                Ok(Self {
                    docs: RwLock::new(docs),
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let docs = self.docs.read().await;
        let json = serde_json::to_vec_pretty(&*docs)?;
        tokio::fs::write(path, json).await?;
        debug!(documents = docs.len(), path = %path.display(), "saved snapshot");
        Ok(())
    }

    pub async fn document_count(&self) -> usize {
        self.docs.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_merge(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let fields = resolve_server_timestamps(fields);
        let mut docs = self.docs.write().await;
        docs.entry(path.clone()).or_default().extend(fields);
        Ok(())
    }

    async fn array_union_merge(
        &self,
        path: &DocPath,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let doc = docs.entry(path.clone()).or_default();
        let slot = doc
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => {
                if !items.contains(&value) {
                    items.push(value);
                }
                Ok(())
            }
            _ => Err(StoreError::NotAnArray {
                path: path.to_string(),
                field: field.to_string(),
            }),
        }
    }

    async fn set_indexed(
        &self,
        collection: &CollectionPath,
        key: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let fields = resolve_server_timestamps(fields);
        self.docs.write().await.insert(collection.doc(key), fields);
        Ok(())
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Fields>, StoreError> {
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let prefix = format!("{}/", collection.as_str());
        let docs = self.docs.read().await;
        let listed = docs
            .range(DocPath(prefix.clone())..)
            .take_while(|(path, _)| path.as_str().starts_with(&prefix))
            .filter_map(|(path, fields)| {
                let id = &path.as_str()[prefix.len()..];
                (!id.contains('/')).then(|| Document {
                    id: id.to_string(),
                    fields: fields.clone(),
                })
            })
            .collect();
        Ok(listed)
    }
}
