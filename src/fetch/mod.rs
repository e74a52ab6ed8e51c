//! Page fetching: the automation-surface contract, rotating sessions,
//! and block-page classification.

mod block;
mod http;
mod session;

pub use block::{body_text, BlockDetector, Verdict};
pub use http::HttpFetcher;
pub use session::{Session, SessionPool, SessionStatus};

use async_trait::async_trait;
use scraper::Html;

use crate::config::LoginSettings;
use crate::error::ScrapeError;

/// A fetched, rendered page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status of the final response.
    pub status: u16,
    /// Page body.
    pub body: String,
}

impl FetchedPage {
    /// Parse the body into a DOM tree. `Html` is not `Send`; callers
    /// must drop it before the next suspension point.
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Contract for the page automation surface.
///
/// The engine depends only on this trait. The default implementation
/// is plain HTTP; browser-based surfaces plug in behind the same seam.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to a URL under the given session identity.
    async fn fetch(&self, url: &str, session: &Session) -> Result<FetchedPage, ScrapeError>;

    /// Run the optional login flow on the given session.
    async fn login(&self, step: &LoginSettings, session: &Session) -> Result<(), ScrapeError>;

    /// Notification that a session identity was retired. Fetchers
    /// holding per-session state (cookie jars, clients) drop it here.
    async fn session_retired(&self, _session_id: u64) {}
}
