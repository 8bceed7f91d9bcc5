//! Registry-Harvest: a resilient business-registry ingester
//!
//! This crate walks the paginated listing pages of a public business registry
//! through a rotating proxy pool and a process-wide rate limiter, extracts the
//! company rows into typed records, and enriches every record with a
//! best-effort CMS classification of its homepage.

pub mod cms;
pub mod config;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod record;
pub mod region;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Registry-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transient network error for {url}: {message}")]
    TransientNetwork { url: String, message: String },

    #[error("Soft block (HTTP {status}) for {url}")]
    SoftBlock { url: String, status: u16 },

    #[error("Fetch exhausted for {url} after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    #[error("A crawl is already running")]
    CrawlAlreadyRunning,

    #[error("No crawl is awaiting finalization")]
    NothingPending,

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Session value already set: {0}")]
    AlreadySet(&'static str),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for checkpoint/serializer I/O failures, the only class of
    /// error surfaced to the user as a failed crawl
    pub fn is_resource_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Output(_) | Self::Io(_))
    }
}

impl From<crawler::FetchError> for HarvestError {
    fn from(err: crawler::FetchError) -> Self {
        match err {
            crawler::FetchError::Exhausted { url, attempts, .. } => {
                Self::FetchExhausted { url, attempts }
            }
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Registry-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cms::CmsProbe;
pub use config::Config;
pub use crawler::{CrawlController, CrawlReport, CrawlStatus, ResilientFetcher};
pub use proxy::{Egress, ProxyCandidate, ProxyPool};
pub use record::{CmsStatus, EnrichedRecord, Field, Record};
pub use region::Region;
