//! End-to-end crawl scenarios driven by a scripted page fetcher.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use listcrawl::config::{CrawlSettings, LoginSettings, SyncSettings};
use listcrawl::crawler::CrawlEngine;
use listcrawl::error::{ScrapeError, SinkError};
use listcrawl::fetch::{FetchedPage, PageFetcher, Session};
use listcrawl::models::stable_id;
use listcrawl::sink::{DocumentStore, JsonDocumentStore, OutputSink};

/// One canned HTTP response.
#[derive(Clone)]
struct PageResponse {
    status: u16,
    body: String,
}

fn ok(body: &str) -> PageResponse {
    PageResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// Serves scripted responses per URL. Responses are consumed in order
/// and the last one repeats. Every fetch is logged with the session
/// identity that performed it.
struct ScriptedFetcher {
    pages: Mutex<HashMap<String, VecDeque<PageResponse>>>,
    log: Mutex<Vec<(String, u64)>>,
    logins: Mutex<Vec<u64>>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<(&str, Vec<PageResponse>)>) -> Self {
        let pages = pages
            .into_iter()
            .map(|(url, responses)| (url.to_string(), responses.into_iter().collect()))
            .collect();
        Self {
            pages: Mutex::new(pages),
            log: Mutex::new(Vec::new()),
            logins: Mutex::new(Vec::new()),
        }
    }

    async fn fetch_log(&self) -> Vec<(String, u64)> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, session: &Session) -> Result<FetchedPage, ScrapeError> {
        self.log.lock().await.push((url.to_string(), session.id));
        let mut pages = self.pages.lock().await;
        let responses = pages
            .get_mut(url)
            .unwrap_or_else(|| panic!("unscripted url fetched: {url}"));
        let response = if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap()
        };
        Ok(FetchedPage {
            url: url.to_string(),
            final_url: url.to_string(),
            status: response.status,
            body: response.body,
        })
    }

    async fn login(&self, _step: &LoginSettings, session: &Session) -> Result<(), ScrapeError> {
        self.logins.lock().await.push(session.id);
        Ok(())
    }
}

fn list_page(anchors: &[(&str, &str)], next: Option<&str>) -> String {
    let mut body = String::from("<div id=\"companyResults\">");
    for (href, name) in anchors {
        body.push_str(&format!(
            "<a class=\"companyName\" href=\"{href}\">{name}</a>"
        ));
    }
    body.push_str("</div>");
    if let Some(next) = next {
        body.push_str(&format!("<a rel=\"next\" href=\"{next}\">Next</a>"));
    }
    body
}

fn settings(output_dir: &std::path::Path) -> CrawlSettings {
    CrawlSettings {
        start_urls: vec!["https://lists.example/companies?page=1".into()],
        max_requests_per_minute: 0,
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}

async fn run_crawl(settings: CrawlSettings, fetcher: Arc<ScriptedFetcher>) -> Arc<ScriptedFetcher> {
    let sink = Arc::new(OutputSink::from_settings(&settings).await.unwrap());
    run_crawl_with_sink(settings, fetcher, sink).await
}

async fn run_crawl_with_sink(
    settings: CrawlSettings,
    fetcher: Arc<ScriptedFetcher>,
    sink: Arc<OutputSink>,
) -> Arc<ScriptedFetcher> {
    let engine = Arc::new(CrawlEngine::new(settings, fetcher.clone(), sink));
    engine.run().await.unwrap();
    fetcher
}

fn dataset_lines(output_dir: &std::path::Path) -> Vec<Value> {
    let raw = std::fs::read_to_string(output_dir.join("dataset.jsonl")).unwrap_or_default();
    raw.lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn paginated_list_emits_all_records() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "https://lists.example/companies?page=1",
            vec![ok(&list_page(
                &[("/company/acme", "Acme"), ("/company/globex", "Globex")],
                Some("/companies?page=2"),
            ))],
        ),
        (
            "https://lists.example/companies?page=2",
            vec![ok(&list_page(&[("/company/initech", "Initech")], None))],
        ),
    ]));

    let fetcher = run_crawl(settings(dir.path()), fetcher).await;

    let lines = dataset_lines(dir.path());
    assert_eq!(lines.len(), 3);
    let names: Vec<&str> = lines.iter().filter_map(|l| l["name"].as_str()).collect();
    assert_eq!(names, vec!["Acme", "Globex", "Initech"]);

    // sourceList is the page each record was found on, so the second
    // page's record names page 2, not the chain's seed.
    let source_of = |name: &str| {
        lines
            .iter()
            .find(|l| l["name"] == Value::String(name.into()))
            .and_then(|l| l["sourceList"].as_str())
            .map(str::to_string)
    };
    assert_eq!(
        source_of("Acme").as_deref(),
        Some("https://lists.example/companies?page=1")
    );
    assert_eq!(
        source_of("Initech").as_deref(),
        Some("https://lists.example/companies?page=2")
    );

    let log = fetcher.fetch_log().await;
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn block_page_is_retried_on_a_fresh_session() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = PageResponse {
        status: 200,
        body: "<html><body>Access Denied</body></html>".into(),
    };
    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "https://lists.example/companies?page=1",
        vec![blocked, ok(&list_page(&[("/company/acme", "Acme")], None))],
    )]));

    let fetcher = run_crawl(settings(dir.path()), fetcher).await;

    let lines = dataset_lines(dir.path());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], Value::String("Acme".into()));

    let log = fetcher.fetch_log().await;
    assert_eq!(log.len(), 2);
    // The session that served the block page was retired, so the
    // retry must ride a different identity.
    assert_ne!(log[0].1, log[1].1);
}

#[tokio::test]
async fn hard_status_block_exhausts_retries_into_a_failure_record() {
    let dir = tempfile::tempdir().unwrap();
    let forbidden = PageResponse {
        status: 403,
        body: "<html><body>nothing suspicious here</body></html>".into(),
    };
    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "https://lists.example/companies?page=1",
        vec![forbidden],
    )]));

    let fetcher = run_crawl(settings(dir.path()), fetcher).await;

    let lines = dataset_lines(dir.path());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["error"], Value::String("FAILED".into()));
    assert_eq!(
        lines[0]["url"],
        Value::String("https://lists.example/companies?page=1".into())
    );

    // Initial attempt plus retries up to the ceiling.
    let log = fetcher.fetch_log().await;
    assert_eq!(log.len(), 4);
}

#[tokio::test]
async fn empty_extraction_stores_a_snapshot_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "https://lists.example/companies?page=1",
        vec![ok("<html><body><p>No results matched.</p></body></html>")],
    )]));

    run_crawl(settings(dir.path()), fetcher).await;

    assert!(dataset_lines(dir.path()).is_empty());
    let snapshots: Vec<_> = std::fs::read_dir(dir.path().join("snapshots"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].starts_with("DEBUG_"));
}

#[tokio::test]
async fn detail_pages_merge_into_the_same_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = settings(dir.path());
    config.follow_detail = true;
    config.sync = SyncSettings {
        enabled: true,
        ..Default::default()
    };

    let detail_body = r#"<h1 class="company-name">Acme Corp</h1>
        <p class="company-address">1 Main St</p>"#;
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "https://lists.example/companies?page=1",
            vec![ok(&list_page(&[("/company/acme", "Acme")], None))],
        ),
        ("https://lists.example/company/acme", vec![ok(detail_body)]),
    ]));

    let store_dir = config.sync_store_dir();
    run_crawl(config, fetcher).await;

    // List pass and detail pass write to the same stable id.
    let lines = dataset_lines(dir.path());
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], lines[1]["id"]);

    let store = JsonDocumentStore::new(store_dir);
    let url = Url::parse("https://lists.example/company/acme").unwrap();
    let doc = store
        .read("companies", &stable_id(&url))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["name"], Value::String("Acme Corp".into()));
    assert_eq!(doc["address"], Value::String("1 Main St".into()));
    assert_eq!(
        doc["sourceList"],
        Value::String("https://lists.example/companies?page=1".into())
    );
}

#[tokio::test]
async fn sparse_detail_page_still_produces_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = settings(dir.path());
    config.follow_detail = true;

    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "https://lists.example/companies?page=1",
            vec![ok(&list_page(&[("/company/mystery", "")], None))],
        ),
        (
            "https://lists.example/company/mystery",
            vec![ok("<main><p>Placeholder page.</p></main>")],
        ),
    ]));

    run_crawl(config, fetcher).await;

    let lines = dataset_lines(dir.path());
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.get("error").is_none()));
    assert!(lines.iter().all(|l| l["name"].is_null()));
}

struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn upsert(
        &self,
        _collection: &str,
        _id: &str,
        _fields: &serde_json::Map<String, Value>,
    ) -> Result<(), SinkError> {
        Err(SinkError::Upsert("backend offline".into()))
    }
}

#[tokio::test]
async fn document_store_outage_never_loses_records() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        (
            "https://lists.example/companies?page=1",
            vec![ok(&list_page(
                &[("/company/acme", "Acme")],
                Some("/companies?page=2"),
            ))],
        ),
        (
            "https://lists.example/companies?page=2",
            vec![ok(&list_page(&[("/company/globex", "Globex")], None))],
        ),
    ]));

    let config = settings(dir.path());
    let sink = Arc::new(
        OutputSink::from_settings(&config)
            .await
            .unwrap()
            .with_external("companies", Arc::new(FailingStore)),
    );
    let fetcher = run_crawl_with_sink(config, fetcher, sink).await;

    // Both pages crawled despite every upsert failing.
    assert_eq!(fetcher.fetch_log().await.len(), 2);
    assert_eq!(dataset_lines(dir.path()).len(), 2);
}

#[tokio::test]
async fn login_step_runs_before_list_pages() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = settings(dir.path());
    config.login = Some(LoginSettings {
        enabled: true,
        login_url: "https://lists.example/login".into(),
        username: "user@example.com".into(),
        password: "hunter2".into(),
        ..serde_json::from_str("{}").unwrap()
    });

    let fetcher = Arc::new(ScriptedFetcher::new(vec![(
        "https://lists.example/companies?page=1",
        vec![ok(&list_page(&[("/company/acme", "Acme")], None))],
    )]));

    let fetcher = run_crawl(config, fetcher).await;

    assert_eq!(fetcher.logins.lock().await.len(), 1);
    assert_eq!(dataset_lines(dir.path()).len(), 1);
}
