//! Error taxonomy for the crawl engine.
//!
//! Per-request errors (`BlockDetected`, timeouts, transport failures)
//! are contained at the request boundary by the engine; only
//! `FatalInit` aborts a run before any crawling begins.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("block page detected at {url}")]
    BlockDetected { url: String },
    #[error("navigation timed out for {url}")]
    NavigationTimeout { url: String },
    #[error("request handler timed out for {url}")]
    HandlerTimeout { url: String },
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("login flow failed: {0}")]
    Login(String),
    #[error("invalid CSS selector {0:?}")]
    Selector(String),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("startup configuration invalid: {0}")]
    FatalInit(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("document upsert failed: {0}")]
    Upsert(String),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Whether this error retires the serving session before requeue.
    pub fn retires_session(&self) -> bool {
        matches!(self, Self::BlockDetected { .. })
    }

    /// Whether the failed request may be requeued for another attempt,
    /// subject to the retry ceiling.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BlockDetected { .. }
                | Self::NavigationTimeout { .. }
                | Self::HandlerTimeout { .. }
                | Self::Fetch { .. }
        )
    }
}
