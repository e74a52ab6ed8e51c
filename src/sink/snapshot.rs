//! Debug snapshots of pages that yielded zero listings.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::SinkError;
use crate::models::clean_text;

/// Snapshot body excerpts are capped so a pathological page cannot
/// bloat the snapshot directory.
const EXCERPT_LIMIT: usize = 5000;

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    url: &'a str,
    snippet: String,
}

/// Stores one JSON file per empty-extraction event, keyed
/// `DEBUG_<millis>_<seq>` so concurrent workers never collide.
pub struct SnapshotStore {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn put(&self, url: &str, body: &str) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("DEBUG_{millis}_{seq}.json"));

        let mut snippet = clean_text(body);
        if snippet.len() > EXCERPT_LIMIT {
            let mut cut = EXCERPT_LIMIT;
            while !snippet.is_char_boundary(cut) {
                cut -= 1;
            }
            snippet.truncate(cut);
        }
        let payload = serde_json::to_vec_pretty(&Snapshot { url, snippet })?;
        tokio::fs::write(&path, payload).await?;
        Ok(())
    }
}
