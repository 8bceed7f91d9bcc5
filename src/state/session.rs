//! Per-region crawl session state

use crate::record::Record;
use crate::region::Region;
use crate::state::CrawlPhase;
use crate::url::PageUrls;
use crate::HarvestError;

/// Owned state of one region's crawl
///
/// `total_pages` and the page URL builder are write-once: they are taken
/// from the first listing page and never change afterwards.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    region: Region,
    phase: CrawlPhase,
    total_pages: Option<u32>,
    page_urls: Option<PageUrls>,
    records: Vec<Record>,
    pages_loaded: u32,
    last_page: Option<u32>,
}

impl CrawlSession {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            phase: CrawlPhase::NotStarted,
            total_pages: None,
            page_urls: None,
            records: Vec::new(),
            pages_loaded: 0,
            last_page: None,
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to the next phase, rejecting anything the phase graph forbids
    pub fn transition(&mut self, to: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!("Crawl of {}: {} -> {}", self.region.name, self.phase, to);
        self.phase = to;
        Ok(())
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn set_total_pages(&mut self, total: u32) -> Result<(), HarvestError> {
        if self.total_pages.is_some() {
            return Err(HarvestError::AlreadySet("total_pages"));
        }
        self.total_pages = Some(total);
        Ok(())
    }

    pub fn page_urls(&self) -> Option<&PageUrls> {
        self.page_urls.as_ref()
    }

    pub fn set_page_urls(&mut self, urls: PageUrls) -> Result<(), HarvestError> {
        if self.page_urls.is_some() {
            return Err(HarvestError::AlreadySet("page_urls"));
        }
        self.page_urls = Some(urls);
        Ok(())
    }

    /// Appends the records of listing page `page` in document order
    pub fn push_page(&mut self, page: u32, records: Vec<Record>) {
        self.records.extend(records);
        self.pages_loaded += 1;
        self.last_page = Some(page);
    }

    /// Highest page whose records were collected
    pub fn last_page(&self) -> Option<u32> {
        self.last_page
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn processed_count(&self) -> usize {
        self.records.len()
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages_loaded
    }
}
