//! Append-only JSONL dataset.

use std::path::Path;

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;

/// One JSON object per line, append-only. Duplicate-id lines are
/// expected across retries and left to downstream consumers.
pub struct DatasetSink {
    file: Mutex<File>,
}

impl DatasetSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().append(true).create(true).open(path).await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub async fn append<T: Serialize>(&self, item: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
