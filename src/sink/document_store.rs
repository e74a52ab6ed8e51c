//! Idempotent document store with merge-on-write semantics.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SinkError;

/// Keyed document store. `upsert` merges the given fields into the
/// document at `collection/id`, creating it if absent. Re-running a
/// crawl therefore updates documents in place instead of duplicating
/// them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SinkError>;
}

/// Filesystem-backed store: one JSON file per document under
/// `<root>/<collection>/<id>.json`.
pub struct JsonDocumentStore {
    root: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{id}.json"))
    }

    /// Read a document back, mainly for inspection and tests.
    pub async fn read(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, SinkError> {
        let path = self.document_path(collection, id);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let value: Value = serde_json::from_str(&raw)?;
                Ok(value.as_object().cloned())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SinkError> {
        let path = self.document_path(collection, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut document = self.read(collection, id).await?.unwrap_or_default();
        for (key, value) in fields {
            document.insert(key.clone(), value.clone());
        }

        // Write-then-rename keeps readers from seeing a torn document.
        let tmp = path.with_extension("json.tmp");
        let serialized = serde_json::to_vec_pretty(&Value::Object(document))?;
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
