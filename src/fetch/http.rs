//! HTTP implementation of the page automation surface.
//!
//! Each session identity gets its own `reqwest::Client` (separate
//! cookie jar, rotated user agent) so retiring a session really does
//! discard its network fingerprint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{CrawlSettings, LoginSettings, ProxySettings};
use crate::error::ScrapeError;

use super::session::Session;
use super::{FetchedPage, PageFetcher};

/// Desktop user agents rotated across sessions.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
];

/// Plain-HTTP page fetcher.
pub struct HttpFetcher {
    navigation_timeout: Duration,
    proxy: Option<ProxySettings>,
    user_agent_override: Option<String>,
    clients: Mutex<HashMap<u64, Client>>,
}

impl HttpFetcher {
    pub fn new(
        navigation_timeout: Duration,
        proxy: Option<ProxySettings>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            navigation_timeout,
            proxy,
            user_agent_override: user_agent,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self::new(
            settings.navigation_timeout(),
            settings.proxy.clone(),
            settings.user_agent.clone(),
        )
    }

    /// Client for a session identity, built lazily on first use.
    async fn client_for(&self, session: &Session, url: &str) -> Result<Client, ScrapeError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&session.id) {
            return Ok(client.clone());
        }

        let user_agent = self.user_agent_override.clone().unwrap_or_else(|| {
            USER_AGENTS[(session.id as usize) % USER_AGENTS.len()].to_string()
        });
        let mut builder = Client::builder()
            .user_agent(user_agent.as_str())
            .timeout(self.navigation_timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);
        if let Some(proxy) = self.proxy.as_ref().filter(|p| p.enabled) {
            if let Some(proxy_url) = proxy.routed_url() {
                let proxy =
                    Proxy::all(proxy_url.as_str()).map_err(|source| ScrapeError::Fetch {
                        url: url.to_string(),
                        source,
                    })?;
                builder = builder.proxy(proxy);
            }
        }
        let client = builder.build().map_err(|source| ScrapeError::Fetch {
            url: url.to_string(),
            source,
        })?;
        debug!("Built client for session {}", session.id);
        clients.insert(session.id, client.clone());
        Ok(client)
    }

}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, session: &Session) -> Result<FetchedPage, ScrapeError> {
        let client = self.client_for(session, url).await?;
        let response = client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|source| classify_transport_error(url, source))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|source| classify_transport_error(url, source))?;
        debug!(
            "Fetched {} (status {}, {} bytes, session {})",
            url,
            status,
            body.len(),
            session.id
        );
        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            body,
        })
    }

    async fn login(&self, step: &LoginSettings, session: &Session) -> Result<(), ScrapeError> {
        let client = self.client_for(session, &step.login_url).await?;

        // Warm the cookie jar (CSRF/session cookies are commonly set
        // on the form page).
        let _ = client.get(&step.login_url).send().await;

        let username_field = input_name(&step.username_selector).unwrap_or("username");
        let password_field = input_name(&step.password_selector).unwrap_or("password");
        let form = [
            (username_field, step.username.as_str()),
            (password_field, step.password.as_str()),
        ];
        let response = client
            .post(&step.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|source| classify_transport_error(&step.login_url, source))?;

        if response.status().is_client_error() || response.status().is_server_error() {
            return Err(ScrapeError::Login(format!(
                "login POST returned {}",
                response.status()
            )));
        }
        debug!("Login form submitted for session {}", session.id);
        Ok(())
    }

    /// Discard the client (and its cookie jar) for a retired session.
    async fn session_retired(&self, session_id: u64) {
        self.clients.lock().await.remove(&session_id);
    }
}

fn classify_transport_error(url: &str, source: reqwest::Error) -> ScrapeError {
    if source.is_timeout() {
        ScrapeError::NavigationTimeout {
            url: url.to_string(),
        }
    } else {
        ScrapeError::Fetch {
            url: url.to_string(),
            source,
        }
    }
}

/// Pull the `name=` attribute value out of a simple input selector
/// such as `input[name=email]`.
fn input_name(selector: &str) -> Option<&str> {
    let start = selector.find("[name=")? + "[name=".len();
    let rest = &selector[start..];
    let end = rest.find(']')?;
    Some(rest[..end].trim_matches(|c| c == '"' || c == '\''))
}
