//! Crawl controller - region crawl orchestration
//!
//! This module contains the crawl loop for one region, including:
//! - Fetching page 0 and reading the page count and pagination token
//! - Walking the remaining pages strictly in order
//! - Cooperative cancellation at page boundaries
//! - Checkpointing exported progress and resuming after it
//! - Finalizing: CMS enrichment, then the record sink
//!
//! Fetch and parse failures never abort a crawl; they end the walk early
//! and the records collected so far still flow to finalization. Only
//! checkpoint and sink I/O failures are returned as errors, and in that case
//! the collected records stay in the controller for [`CrawlController::retry_finalize`].

use crate::cms::CmsProbe;
use crate::config::Config;
use crate::crawler::parser::{extract_page, ExtractedPage};
use crate::crawler::{RateLimiter, ResilientFetcher};
use crate::output::{CsvSink, ExportSummary, RecordSink};
use crate::proxy::ProxyPool;
use crate::record::{header_row, EnrichedRecord, Record};
use crate::region::Region;
use crate::state::{CrawlPhase, CrawlSession};
use crate::storage::{open_proxy_store, ProgressStore};
use crate::url::{search_url, PageUrls};
use crate::HarvestError;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

const EVENT_CAPACITY: usize = 256;

/// Set while any controller in the process is crawling or finalizing
static CRAWL_ACTIVE: AtomicBool = AtomicBool::new(false);

/// How a region crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// Every page was fetched
    Completed,

    /// The stop signal was honored at a page boundary
    StoppedByUser,

    /// `page` could not be fetched or had no listing table
    StoppedEarly { page: u32 },
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::StoppedByUser => write!(f, "stopped by user"),
            Self::StoppedEarly { page } => {
                write!(f, "stopped early: page {} unreachable", page + 1)
            }
        }
    }
}

/// Final result of a region crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub region: Region,
    pub status: CrawlStatus,
    pub pages_loaded: u32,
    pub total_pages: u32,
    pub export: ExportSummary,
}

/// Events published while a crawl runs
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Progress {
        processed: usize,
        pages_loaded: u32,
        total_pages: u32,
    },
    Message(String),
    Finished(CrawlReport),
    Failed(String),
}

/// Cloneable stop signal
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Asks the running crawl to stop at the next page boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A session whose finalization hit an I/O failure
struct Pending {
    session: CrawlSession,
    status: CrawlStatus,
    enriched: Option<Vec<EnrichedRecord>>,

    /// Export that already succeeded, when only the checkpoint failed
    exported: Option<PathBuf>,
}

/// Releases the process-wide crawl slot and the controller's own flag
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
        CRAWL_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Drives one region crawl at a time
pub struct CrawlController {
    config: Arc<Config>,
    base: Url,
    fetcher: Arc<ResilientFetcher>,
    probe: Arc<CmsProbe>,
    sink: Arc<dyn RecordSink>,
    progress: Option<ProgressStore>,
    running: AtomicBool,
    stop: StopHandle,
    events: broadcast::Sender<CrawlEvent>,
    pending: Mutex<Option<Pending>>,
}

impl CrawlController {
    /// Creates a controller from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `fetcher` - Fetcher for listing pages
    /// * `probe` - CMS classifier used during finalization
    /// * `sink` - Receives the enriched records
    pub fn new(
        config: Config,
        fetcher: Arc<ResilientFetcher>,
        probe: CmsProbe,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, HarvestError> {
        let base = Url::parse(&config.target.base_url)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            base,
            fetcher,
            probe: Arc::new(probe),
            sink,
            progress: None,
            running: AtomicBool::new(false),
            stop: StopHandle::default(),
            events,
            pending: Mutex::new(None),
        })
    }

    /// Enables checkpointing and resume
    pub fn with_progress_store(mut self, store: ProgressStore) -> Self {
        self.progress = Some(store);
        self
    }

    /// Builds the full production stack from `config`
    ///
    /// Opens the proxy database, initializes the pool, and wires the rate
    /// limiter, fetcher, probe, CSV sink and checkpoint store together.
    pub async fn from_config(config: Config) -> Result<Self, HarvestError> {
        let store = Arc::new(open_proxy_store(Path::new(&config.proxy.store_path))?);
        let pool = ProxyPool::new(&config, store)?;
        pool.initialize().await;

        let limiter = Arc::new(RateLimiter::new(config.fetch.min_delay()));
        let fetcher = Arc::new(ResilientFetcher::new(config.fetch.clone(), pool, limiter));
        let probe = CmsProbe::new(&config.probe)?;
        let sink = Arc::new(CsvSink::new(&config.output.csv_dir));
        let progress = ProgressStore::new(&config.output.checkpoint_path);

        Ok(Self::new(config, fetcher, probe, sink)?.with_progress_store(progress))
    }

    pub fn fetcher(&self) -> &Arc<ResilientFetcher> {
        &self.fetcher
    }

    pub fn progress_store(&self) -> Option<&ProgressStore> {
        self.progress.as_ref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Raises the stop signal
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// True while this controller is crawling or finalizing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True while any controller in the process is crawling or finalizing
    pub fn any_running() -> bool {
        CRAWL_ACTIVE.load(Ordering::SeqCst)
    }

    /// Subscribes to progress, message and terminal events
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// Records held back by a failed finalization, if any
    pub fn pending_records(&self) -> Option<Vec<Record>> {
        self.lock_pending()
            .as_ref()
            .map(|p| p.session.records().to_vec())
    }

    /// Crawls `region` to completion, stop, or early termination
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Records were enriched and written
    /// * `Err(HarvestError::CrawlAlreadyRunning)` - Another crawl is active
    /// * `Err(HarvestError)` - A checkpoint or sink I/O failure; the
    ///   collected records are kept for [`CrawlController::retry_finalize`]
    pub async fn start(&self, region: Region) -> Result<CrawlReport, HarvestError> {
        let _guard = self.claim()?;
        self.stop.reset();
        self.lock_pending().take();

        let result = self.run(region).await;
        self.publish_outcome(&result);
        result
    }

    /// Retries finalization of a session whose checkpoint or sink failed
    pub async fn retry_finalize(&self) -> Result<CrawlReport, HarvestError> {
        let _guard = self.claim()?;

        let pending = self.lock_pending().take().ok_or(HarvestError::NothingPending)?;
        let result = self
            .finalize(
                pending.session,
                pending.status,
                pending.enriched,
                pending.exported,
            )
            .await;
        self.publish_outcome(&result);
        result
    }

    /// Takes the process-wide crawl slot
    fn claim(&self) -> Result<RunningGuard<'_>, HarvestError> {
        if CRAWL_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(HarvestError::CrawlAlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(RunningGuard(&self.running))
    }

    async fn run(&self, region: Region) -> Result<CrawlReport, HarvestError> {
        let mut session = CrawlSession::new(region);

        let resume = match &self.progress {
            Some(store) => store
                .load_or_default()?
                .resume_point(region.code),
            None => None,
        };
        let (first_page, processed) = match resume {
            Some(point) => {
                tracing::info!(
                    "Resuming {} at page {} ({} companies already processed)",
                    region.name,
                    point.next_page + 1,
                    point.processed_ids.len()
                );
                (point.next_page, point.processed_ids)
            }
            None => (1, HashSet::new()),
        };

        let status = match self.walk(&mut session, first_page, &processed).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Crawl of {} failed: {}", region.name, e);
                let next = match session.phase() {
                    CrawlPhase::WalkingPages(k) => k + 1,
                    _ => first_page,
                };
                self.hold(session, CrawlStatus::StoppedEarly { page: next }, None, None);
                return Err(e);
            }
        };

        self.finalize(session, status, None, None).await
    }

    async fn walk(
        &self,
        session: &mut CrawlSession,
        first_page: u32,
        processed: &HashSet<String>,
    ) -> Result<CrawlStatus, HarvestError> {
        let region = *session.region();
        session.transition(CrawlPhase::FetchingFirstPage)?;

        let first_url = search_url(&self.base, &region)?;
        self.message(format!("Loading first page of {}", region.name));

        let Some(page) = self.fetch_page(&first_url, 0, true).await else {
            session.set_total_pages(0)?;
            return Ok(CrawlStatus::StoppedEarly { page: 0 });
        };

        let total = page.total_pages.unwrap_or(0);
        session.set_total_pages(total)?;
        let page_base = page
            .page_base
            .clone()
            .unwrap_or_else(|| first_url.to_string());
        session.set_page_urls(PageUrls::new(self.base.clone(), page_base, page.token.clone()))?;
        self.accept_page(session, 0, page.records, processed);

        tracing::info!("{}: {} listing pages", region.name, total);

        for k in first_page.max(1)..total {
            if self.stop.is_stopped() {
                return Ok(CrawlStatus::StoppedByUser);
            }

            session.transition(CrawlPhase::WalkingPages(k))?;
            self.message(format!("Processing page {} of {}", k + 1, total));

            tokio::time::sleep(self.page_delay()).await;
            if self.stop.is_stopped() {
                return Ok(CrawlStatus::StoppedByUser);
            }

            let url = match session.page_urls() {
                Some(urls) => urls.page_url(k)?,
                None => return Ok(CrawlStatus::StoppedEarly { page: k }),
            };

            match self.fetch_page(&url, k, false).await {
                Some(page) => self.accept_page(session, k, page.records, processed),
                None => {
                    tracing::warn!("Page {} of {} unusable, ending walk", k + 1, total);
                    return Ok(CrawlStatus::StoppedEarly { page: k });
                }
            }
        }

        Ok(CrawlStatus::Completed)
    }

    /// Fetches and extracts page `k`, retrying the whole page on exhaustion
    ///
    /// Returns None when every attempt failed or the page had no listing
    /// table.
    async fn fetch_page(&self, url: &Url, k: u32, is_first: bool) -> Option<ExtractedPage> {
        let crawl = &self.config.crawl;

        for retry in 0..=crawl.page_retries {
            if retry > 0 {
                let wait = crawl.page_retry_base_ms + u64::from(retry - 1) * crawl.page_retry_step_ms;
                tracing::info!("Retrying page {} in {}ms", k + 1, wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }

            match self.fetcher.fetch(url).await {
                Ok(body) => {
                    let page = extract_page(&body, is_first, &self.base);
                    if page.structure_found {
                        return Some(page);
                    }
                    tracing::warn!("Page {} has no listing table", k + 1);
                    return None;
                }
                Err(e) => tracing::warn!("Page {}: {}", k + 1, HarvestError::from(e)),
            }
        }

        None
    }

    fn accept_page(
        &self,
        session: &mut CrawlSession,
        k: u32,
        records: Vec<Record>,
        processed: &HashSet<String>,
    ) {
        let fresh: Vec<Record> = records
            .into_iter()
            .filter(|r| !processed.contains(&r.company_id()))
            .collect();

        session.push_page(k, fresh);

        let total_pages = session.total_pages().unwrap_or(0);
        self.publish(CrawlEvent::Progress {
            processed: session.processed_count(),
            pages_loaded: session.pages_loaded(),
            total_pages,
        });
        self.message(format!(
            "Processed {} companies from {}/{} pages",
            session.processed_count(),
            session.pages_loaded(),
            total_pages
        ));
    }

    async fn finalize(
        &self,
        mut session: CrawlSession,
        status: CrawlStatus,
        enriched: Option<Vec<EnrichedRecord>>,
        exported: Option<PathBuf>,
    ) -> Result<CrawlReport, HarvestError> {
        if session.phase() != CrawlPhase::Finalizing {
            session.transition(CrawlPhase::Finalizing)?;
        }
        let region = *session.region();

        let enriched = match enriched {
            Some(enriched) => enriched,
            None => {
                self.message(format!(
                    "Detecting CMS for {} companies",
                    session.processed_count()
                ));
                self.probe.enrich_all(session.records().to_vec()).await
            }
        };

        let path = match exported {
            Some(path) => path,
            None => match self.sink.write(&region, &header_row(), &enriched) {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!("Could not write records of {}: {}", region.name, e);
                    self.hold(session, status, Some(enriched), None);
                    return Err(e.into());
                }
            },
        };

        if let Err(e) = self.commit_progress(&session, status) {
            tracing::error!("Could not checkpoint {}: {}", region.name, e);
            self.hold(session, status, Some(enriched), Some(path));
            return Err(e);
        }

        session.transition(CrawlPhase::Done)?;

        let report = CrawlReport {
            region,
            status,
            pages_loaded: session.pages_loaded(),
            total_pages: session.total_pages().unwrap_or(0),
            export: ExportSummary::new(path, &enriched),
        };

        tracing::info!(
            "{}: {} with {} companies from {}/{} pages",
            region.name,
            report.status,
            report.export.records,
            report.pages_loaded,
            report.total_pages
        );
        Ok(report)
    }

    /// Checkpoints the session's pages once the sink has accepted them
    ///
    /// A completed region is marked done; otherwise the last collected page
    /// and every exported company id are recorded so a later run resumes
    /// right after them.
    fn commit_progress(&self, session: &CrawlSession, status: CrawlStatus) -> Result<(), HarvestError> {
        let Some(store) = &self.progress else {
            return Ok(());
        };
        let code = session.region().code;

        if status == CrawlStatus::Completed {
            store.mark_region_complete(code)?;
        } else if let Some(page) = session.last_page() {
            store.save_page(code, page, session.records().iter().map(Record::company_id))?;
        }
        Ok(())
    }

    fn hold(
        &self,
        mut session: CrawlSession,
        status: CrawlStatus,
        enriched: Option<Vec<EnrichedRecord>>,
        exported: Option<PathBuf>,
    ) {
        if session.phase().is_walking() {
            // Walking phases may always move to Finalizing
            let _ = session.transition(CrawlPhase::Finalizing);
        }
        *self.lock_pending() = Some(Pending {
            session,
            status,
            enriched,
            exported,
        });
    }

    fn page_delay(&self) -> Duration {
        let crawl = &self.config.crawl;
        let max = crawl.page_delay_max_ms.max(crawl.page_delay_min_ms);
        Duration::from_millis(fastrand::u64(crawl.page_delay_min_ms..=max))
    }

    fn publish_outcome(&self, result: &Result<CrawlReport, HarvestError>) {
        match result {
            Ok(report) => self.publish(CrawlEvent::Finished(report.clone())),
            Err(e) => self.publish(CrawlEvent::Failed(e.to_string())),
        }
    }

    fn message(&self, text: String) {
        tracing::debug!("{}", text);
        self.publish(CrawlEvent::Message(text));
    }

    fn publish(&self, event: CrawlEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
