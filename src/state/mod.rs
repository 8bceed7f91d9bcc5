//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the forward-only phase graph of a region crawl
//! - `CrawlSession`: the owned, per-region crawl state (pagination, records)

mod crawl_phase;
mod session;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use session::CrawlSession;
