//! Page requests and their lifecycle state machine.

use serde::{Deserialize, Serialize};
use url::Url;

use super::record::canonicalize;

/// What kind of page a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageLabel {
    List,
    Detail,
    Login,
}

/// A pending page fetch. Uniqueness key = (canonical URL, label).
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub url: Url,
    pub label: PageLabel,
    /// Completed attempts so far; bumped on every requeue.
    pub attempt: u32,
    /// List page that discovered this request, for DETAIL requests.
    pub source_list: Option<String>,
}

impl PageRequest {
    pub fn new(url: Url, label: PageLabel) -> Self {
        Self {
            url: canonicalize(&url),
            label,
            attempt: 0,
            source_list: None,
        }
    }

    pub fn with_source(mut self, source_list: &Url) -> Self {
        self.source_list = Some(canonicalize(source_list).to_string());
        self
    }

    pub fn dedup_key(&self) -> (String, PageLabel) {
        (self.url.as_str().to_string(), self.label)
    }

    /// The same request, one attempt later.
    pub fn retry(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

/// Per-request lifecycle, driven only by block-detector and timeout
/// outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    InFlight,
    BlockedRetry(u32),
    Failed,
    Succeeded,
}

impl RequestState {
    /// Terminal or retry state after a failed attempt. Retryable
    /// failures requeue until the attempt count reaches the ceiling.
    pub fn resolve_failure(retryable: bool, attempt: u32, retry_ceiling: u32) -> Self {
        if retryable && attempt < retry_ceiling {
            Self::BlockedRetry(attempt + 1)
        } else {
            Self::Failed
        }
    }
}
