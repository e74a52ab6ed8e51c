//! Output sinks: the append-only dataset is the source of truth, the
//! document store is an optional best-effort mirror, and snapshots
//! capture pages that extracted nothing.

mod dataset;
mod document_store;
mod snapshot;

use std::sync::Arc;

use tracing::warn;

pub use dataset::DatasetSink;
pub use document_store::{DocumentStore, JsonDocumentStore};
pub use snapshot::SnapshotStore;

use crate::config::CrawlSettings;
use crate::error::SinkError;
use crate::models::{FailureRecord, ListingRecord};

/// Environment override for the document-store collection name.
const COLLECTION_ENV: &str = "LISTCRAWL_COLLECTION";

/// Combined output policy. Records always land in the dataset first;
/// a document-store failure is logged and never fails the crawl.
pub struct OutputSink {
    dataset: DatasetSink,
    external: Option<(String, Arc<dyn DocumentStore>)>,
    snapshots: SnapshotStore,
}

impl OutputSink {
    pub async fn from_settings(settings: &CrawlSettings) -> Result<Self, SinkError> {
        let dataset = DatasetSink::open(&settings.output_dir.join("dataset.jsonl")).await?;
        let snapshots = SnapshotStore::new(settings.output_dir.join("snapshots"));
        let external = if settings.sync.enabled {
            let collection = std::env::var(COLLECTION_ENV)
                .unwrap_or_else(|_| settings.sync.collection.clone());
            let store: Arc<dyn DocumentStore> =
                Arc::new(JsonDocumentStore::new(settings.sync_store_dir()));
            Some((collection, store))
        } else {
            None
        };
        Ok(Self {
            dataset,
            external,
            snapshots,
        })
    }

    /// Swap in a custom document store (tests and alternative backends).
    pub fn with_external(mut self, collection: &str, store: Arc<dyn DocumentStore>) -> Self {
        self.external = Some((collection.to_string(), store));
        self
    }

    pub async fn record(&self, record: &ListingRecord) -> Result<(), SinkError> {
        self.dataset.append(record).await?;
        if let Some((collection, store)) = &self.external {
            let fields = record.to_fields();
            if let Err(err) = store.upsert(collection, &record.id, &fields).await {
                warn!("Document store upsert failed for {}: {err}", record.id);
            }
        }
        Ok(())
    }

    pub async fn failure(&self, failure: &FailureRecord) -> Result<(), SinkError> {
        self.dataset.append(failure).await
    }

    pub async fn debug_snapshot(&self, url: &str, body: &str) -> Result<(), SinkError> {
        self.snapshots.put(url, body).await
    }
}
