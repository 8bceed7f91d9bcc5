//! Crawler module for registry listing pages
//!
//! This module contains the core crawling logic, including:
//! - Process-wide request spacing
//! - Resilient fetching through the proxy pool
//! - Listing-page extraction
//! - Region crawl orchestration

mod coordinator;
mod fetcher;
mod parser;
mod rate_limiter;

pub use coordinator::{CrawlController, CrawlEvent, CrawlReport, CrawlStatus, StopHandle};
pub use fetcher::{
    build_http_client, random_user_agent, AttemptOutcome, FetchAttempt, FetchError,
    ResilientFetcher, USER_AGENTS,
};
pub use parser::{extract_page, parse_leading_int, ExtractedPage, PAGE_INDICATOR};
pub use rate_limiter::RateLimiter;

use crate::config::Config;
use crate::region::Region;
use crate::HarvestError;

/// Crawls one region with the production stack built from `config`
///
/// This is the main entry point for a one-shot crawl. It will:
/// 1. Open the proxy store and initialize the pool
/// 2. Wire the rate limiter, fetcher, probe and CSV sink
/// 3. Walk the region's listing pages
/// 4. Enrich and export the records
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `region` - Region to crawl
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished and records were written
/// * `Err(HarvestError)` - Setup or a checkpoint/export failed
pub async fn crawl(config: Config, region: Region) -> Result<CrawlReport, HarvestError> {
    let controller = CrawlController::from_config(config).await?;
    controller.start(region).await
}
