//! Object store interface plus local and in-memory backends.

use crate::io::ObjectMeta;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("Object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Object content plus the metadata the store reported for it.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub meta: ObjectMeta,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read_object(&self, bucket: &str, path: &str) -> Result<StoredObject, ObjectError>;

    /// Write an object. Returns its public URL when `public` is set.
    async fn write_object(
        &self,
        bucket: &str,
        path: &str,
        content: Bytes,
        content_type: &str,
        public: bool,
    ) -> Result<Option<String>, ObjectError>;
}

fn public_url(base: &str, bucket: &str, path: &str) -> String {
    format!("{}/{bucket}/{path}", base.trim_end_matches('/'))
}

/// Buckets are directories under `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, ObjectError> {
        let relative = Path::new(bucket).join(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || path.is_empty() || escapes {
            return Err(ObjectError::InvalidPath(format!("{bucket}/{path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read_object(&self, bucket: &str, path: &str) -> Result<StoredObject, ObjectError> {
        let file = self.resolve(bucket, path)?;
        let data = match tokio::fs::read(&file).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectError::NotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        Ok(StoredObject {
            data: Bytes::from(data),
            meta: ObjectMeta::from_name(path),
        })
    }

    async fn write_object(
        &self,
        bucket: &str,
        path: &str,
        content: Bytes,
        content_type: &str,
        public: bool,
    ) -> Result<Option<String>, ObjectError> {
        let file = self.resolve(bucket, path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, &content).await?;
        debug!(bucket, path, content_type, bytes = content.len(), "wrote object");
        Ok(public.then(|| public_url(&self.public_base_url, bucket, path)))
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    object: StoredObject,
    public: bool,
}

/// Object store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), MemoryObject>>,
    public_base_url: String,
}

impl MemoryObjectStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::default(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Place an object as an upload would; meta comes from the name.
    pub async fn insert(&self, bucket: &str, path: &str, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            meta: ObjectMeta::from_name(path),
        };
        self.objects.write().await.insert(
            (bucket.to_string(), path.to_string()),
            MemoryObject {
                object,
                public: false,
            },
        );
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.object.clone())
    }

    pub async fn is_public(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .is_some_and(|o| o.public)
    }

    /// Object paths in `bucket`, sorted.
    pub async fn list(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read_object(&self, bucket: &str, path: &str) -> Result<StoredObject, ObjectError> {
        self.get(bucket, path).await.ok_or_else(|| ObjectError::NotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    async fn write_object(
        &self,
        bucket: &str,
        path: &str,
        content: Bytes,
        content_type: &str,
        public: bool,
    ) -> Result<Option<String>, ObjectError> {
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            name_hint: path.rsplit('/').next().unwrap_or(path).to_string(),
            ..Default::default()
        };
        self.objects.write().await.insert(
            (bucket.to_string(), path.to_string()),
            MemoryObject {
                object: StoredObject {
                    data: content,
                    meta,
                },
                public,
            },
        );
        Ok(public.then(|| public_url(&self.public_base_url, bucket, path)))
    }
}
