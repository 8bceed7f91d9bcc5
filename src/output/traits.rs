//! Output sink traits and types
//!
//! This module defines the trait interface for record sinks and the
//! summary of one export.

use crate::record::{CmsStatus, EnrichedRecord};
use crate::region::Region;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary of one finished export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Where the records were written
    pub path: PathBuf,

    pub records: usize,

    /// Records with a homepage that was probed
    pub probed: usize,

    /// Records classified likely for platform A
    pub platform_a_likely: usize,

    /// Records classified likely or possibly for platform B
    pub platform_b_candidates: usize,

    /// Records where at least one probe failed outright
    pub probe_errors: usize,
}

impl ExportSummary {
    /// Counts the classifications of `records` written to `path`
    pub fn new(path: PathBuf, records: &[EnrichedRecord]) -> Self {
        let mut summary = Self {
            path,
            records: records.len(),
            ..Self::default()
        };

        for r in records {
            if r.platform_a.is_some() || r.platform_b.is_some() {
                summary.probed += 1;
            }
            if r.platform_a == Some(CmsStatus::Likely) {
                summary.platform_a_likely += 1;
            }
            if matches!(r.platform_b, Some(CmsStatus::Likely | CmsStatus::Possibly)) {
                summary.platform_b_candidates += 1;
            }
            if r.platform_a == Some(CmsStatus::ProbeError)
                || r.platform_b == Some(CmsStatus::ProbeError)
            {
                summary.probe_errors += 1;
            }
        }

        summary
    }
}

/// Trait for record sinks
///
/// A sink receives the finished, enriched record set of one region in
/// crawl order together with the header row, and owns the on-disk format.
pub trait RecordSink: Send + Sync {
    /// Writes the records of one region
    ///
    /// # Arguments
    ///
    /// * `region` - The crawled region
    /// * `header` - Column labels in declared field order
    /// * `records` - Enriched records in crawl order
    ///
    /// # Returns
    ///
    /// The location the records were written to
    fn write(
        &self,
        region: &Region,
        header: &[&str],
        records: &[EnrichedRecord],
    ) -> OutputResult<PathBuf>;
}
