//! Crawl phase definitions for a single region's crawl
//!
//! A crawl moves strictly forward through these phases. The stop signal is
//! not a phase: it is checked at page boundaries and only ever leads to
//! `Finalizing`.
use std::fmt;

/// Represents the current phase of a region crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Session created, nothing fetched yet
    NotStarted,

    /// Fetching and extracting listing page 0
    FetchingFirstPage,

    /// Fetching and extracting listing page `k` (k >= 1)
    WalkingPages(u32),

    /// Enriching and handing records to the serializer
    Finalizing,

    /// Terminal
    Done,
}

impl CrawlPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while listing pages are still being fetched
    pub fn is_walking(&self) -> bool {
        matches!(self, Self::FetchingFirstPage | Self::WalkingPages(_))
    }

    /// Checks whether moving from `self` to `to` is allowed
    ///
    /// Page indices only grow; a resumed walk may jump from the first page
    /// straight to a later one.
    pub fn can_transition_to(&self, to: CrawlPhase) -> bool {
        match (self, to) {
            (Self::NotStarted, Self::FetchingFirstPage) => true,
            (Self::FetchingFirstPage, Self::WalkingPages(k)) => k >= 1,
            (Self::FetchingFirstPage, Self::Finalizing) => true,
            (Self::WalkingPages(j), Self::WalkingPages(k)) => k > *j,
            (Self::WalkingPages(_), Self::Finalizing) => true,
            (Self::Finalizing, Self::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::FetchingFirstPage => write!(f, "fetching_first_page"),
            Self::WalkingPages(k) => write!(f, "walking_pages({})", k),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Done => write!(f, "done"),
        }
    }
}
