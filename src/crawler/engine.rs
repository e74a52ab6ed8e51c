//! The crawl engine: a pool of workers that claim requests from the
//! frontier, fetch through session identities, evaluate the page, and
//! emit records or schedule follow-up work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlSettings;
use crate::error::ScrapeError;
use crate::extract::{extract_anchors, extract_fields, resolve_next, FieldRules};
use crate::fetch::{body_text, BlockDetector, FetchedPage, PageFetcher, SessionPool, Verdict};
use crate::models::{FailureRecord, ListingRecord, PageLabel, PageRequest, RequestState};
use crate::sink::OutputSink;

use super::{Frontier, Throttle};

/// Counters accumulated over one crawl run.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub dispatched: AtomicU64,
    pub records: AtomicU64,
    pub failures: AtomicU64,
    pub blocks: AtomicU64,
}

impl CrawlStats {
    pub fn summary(&self) -> String {
        format!(
            "{} requests, {} records, {} failures, {} blocks",
            self.dispatched.load(Ordering::Relaxed),
            self.records.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
            self.blocks.load(Ordering::Relaxed),
        )
    }
}

/// What a fetched page yielded, computed in a sync scope so the parsed
/// DOM never crosses an await point.
enum PageOutcome {
    Blocked,
    List {
        records: Vec<ListingRecord>,
        detail_urls: Vec<Url>,
        next_page: Option<Url>,
    },
    Detail {
        record: ListingRecord,
    },
}

pub struct CrawlEngine {
    settings: CrawlSettings,
    fetcher: Arc<dyn PageFetcher>,
    frontier: Arc<Frontier>,
    throttle: Arc<Throttle>,
    sessions: Arc<SessionPool>,
    detector: BlockDetector,
    field_rules: FieldRules,
    sink: Arc<OutputSink>,
    stats: Arc<CrawlStats>,
}

impl CrawlEngine {
    pub fn new(
        settings: CrawlSettings,
        fetcher: Arc<dyn PageFetcher>,
        sink: Arc<OutputSink>,
    ) -> Self {
        let frontier = Arc::new(Frontier::new(settings.max_requests_per_crawl));
        let throttle = Arc::new(Throttle::per_minute(settings.max_requests_per_minute));
        let sessions = Arc::new(SessionPool::new(
            settings.sessions.pool_size,
            settings.sessions.max_usage,
        ));
        let detector = BlockDetector::new(&settings.block_phrases);
        let field_rules = FieldRules::default().with_overrides(&settings.selectors);
        Self {
            settings,
            fetcher,
            frontier,
            throttle,
            sessions,
            detector,
            field_rules,
            sink,
            stats: Arc::new(CrawlStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Seed the frontier and run workers until the frontier drains or
    /// the request budget is spent. The login step, when enabled, is
    /// fully resolved before any list page is fetched.
    pub async fn run(self: Arc<Self>) -> Result<(), ScrapeError> {
        self.seed_login().await?;
        while let Some(request) = self.frontier.next().await {
            self.process(request).await;
        }
        self.seed().await?;

        let worker_count = self.settings.max_concurrency.max(1);
        info!("Starting crawl with {} workers", worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let engine = Arc::clone(&self);
            workers.push(tokio::spawn(async move {
                engine.worker_loop(worker_id).await;
            }));
        }
        for worker in workers {
            if let Err(err) = worker.await {
                warn!("Worker task panicked: {err}");
            }
        }
        info!("Crawl finished: {}", self.stats.summary());
        Ok(())
    }

    async fn seed_login(&self) -> Result<(), ScrapeError> {
        if let Some(login) = self.settings.login.as_ref().filter(|l| l.enabled) {
            let url = Url::parse(&login.login_url)
                .map_err(|e| ScrapeError::FatalInit(format!("invalid login url: {e}")))?;
            self.frontier
                .enqueue_priority(PageRequest::new(url, PageLabel::Login))
                .await;
        }
        Ok(())
    }

    async fn seed(&self) -> Result<(), ScrapeError> {
        for seed in &self.settings.start_urls {
            let url = Url::parse(seed)
                .map_err(|e| ScrapeError::FatalInit(format!("invalid start url {seed}: {e}")))?;
            let request = PageRequest::new(url, PageLabel::List);
            self.frontier.enqueue(request).await;
        }
        Ok(())
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            match self.frontier.next().await {
                Some(request) => {
                    self.process(request).await;
                }
                None => {
                    if self.frontier.is_idle().await
                        || self.frontier.remaining_budget().await == 0
                    {
                        debug!("Worker {} draining, no work left", worker_id);
                        break;
                    }
                    // Another worker may still produce follow-up work.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    async fn process(&self, request: PageRequest) {
        self.throttle.acquire().await;
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        let session = self.sessions.checkout().await;

        let handled = tokio::time::timeout(
            self.settings.handler_timeout(),
            self.handle(&request, &session),
        )
        .await
        .unwrap_or_else(|_elapsed| {
            Err(ScrapeError::HandlerTimeout {
                url: request.url.to_string(),
            })
        });

        match handled {
            Ok(()) => {
                self.sessions.release(&session).await;
            }
            Err(err) => {
                if err.retires_session() {
                    self.stats.blocks.fetch_add(1, Ordering::Relaxed);
                    warn!("Retiring session {} after block on {}", session.id, request.url);
                    self.sessions.retire(&session).await;
                    self.fetcher.session_retired(session.id).await;
                } else {
                    self.sessions.release(&session).await;
                }
                match RequestState::resolve_failure(
                    err.is_retryable(),
                    request.attempt,
                    self.settings.retry_ceiling,
                ) {
                    RequestState::BlockedRetry(attempt) => {
                        debug!("Scheduling retry {} for {}", attempt, request.url);
                        self.frontier.requeue(request.retry()).await;
                    }
                    _ => {
                        warn!("Request failed permanently: {} ({err})", request.url);
                        self.stats.failures.fetch_add(1, Ordering::Relaxed);
                        let failure = FailureRecord::new(request.url.as_str());
                        if let Err(sink_err) = self.sink.failure(&failure).await {
                            warn!("Could not persist failure record: {sink_err}");
                        }
                    }
                }
            }
        }
        self.frontier.complete().await;
    }

    async fn handle(
        &self,
        request: &PageRequest,
        session: &crate::fetch::Session,
    ) -> Result<(), ScrapeError> {
        if request.label == PageLabel::Login {
            if let Some(login) = self.settings.login.as_ref() {
                info!("Performing login step");
                return self.fetcher.login(login, session).await;
            }
            return Ok(());
        }

        let page = self.fetcher.fetch(request.url.as_str(), session).await?;
        let outcome = evaluate_page(
            &page,
            request,
            &self.detector,
            &self.settings,
            &self.field_rules,
        )?;

        match outcome {
            PageOutcome::Blocked => Err(ScrapeError::BlockDetected {
                url: request.url.to_string(),
            }),
            PageOutcome::List {
                records,
                detail_urls,
                next_page,
            } => {
                if records.is_empty() {
                    warn!("No listings extracted from {}", request.url);
                    if let Err(err) = self.sink.debug_snapshot(&page.url, &page.body).await {
                        warn!("Could not store page snapshot: {err}");
                    }
                }
                for record in records {
                    self.sink.record(&record).await?;
                    self.stats.records.fetch_add(1, Ordering::Relaxed);
                }
                if self.settings.follow_detail {
                    for url in detail_urls {
                        let detail =
                            PageRequest::new(url, PageLabel::Detail).with_source(&request.url);
                        self.frontier.enqueue(detail).await;
                    }
                }
                if let Some(next) = next_page {
                    info!("Enqueued next page {}", next);
                    self.frontier
                        .enqueue(PageRequest::new(next, PageLabel::List))
                        .await;
                }
                Ok(())
            }
            PageOutcome::Detail { record } => {
                self.sink.record(&record).await?;
                self.stats.records.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }
}

/// Parse and evaluate a fetched page. Sync on purpose: the parsed DOM
/// is not `Send`, so everything derived from it is computed here and
/// returned as owned data.
fn evaluate_page(
    page: &FetchedPage,
    request: &PageRequest,
    detector: &BlockDetector,
    settings: &CrawlSettings,
    field_rules: &FieldRules,
) -> Result<PageOutcome, ScrapeError> {
    let document = page.parse();
    let text = body_text(&document);
    if detector.classify(page.status, &text) == Verdict::Blocked {
        return Ok(PageOutcome::Blocked);
    }

    let base = Url::parse(&page.final_url).unwrap_or_else(|_| request.url.clone());
    match request.label {
        PageLabel::List => {
            let anchors = extract_anchors(&document, &base, &settings.list_selectors);
            let mut records = Vec::with_capacity(anchors.len());
            let mut detail_urls = Vec::with_capacity(anchors.len());
            for anchor in anchors {
                // Each record names the list page it was found on, not
                // the chain's seed.
                records.push(ListingRecord::from_list_anchor(
                    anchor.name,
                    &anchor.url,
                    &request.url,
                ));
                detail_urls.push(anchor.url);
            }
            let next_page = resolve_next(&document, &request.url, &settings.next_page_marker);
            Ok(PageOutcome::List {
                records,
                detail_urls,
                next_page,
            })
        }
        PageLabel::Detail => {
            let fields = extract_fields(&document, &base, field_rules);
            let record =
                ListingRecord::from_fields(&request.url, fields, request.source_list.clone());
            Ok(PageOutcome::Detail { record })
        }
        PageLabel::Login => Ok(PageOutcome::List {
            records: Vec::new(),
            detail_urls: Vec::new(),
            next_page: None,
        }),
    }
}
