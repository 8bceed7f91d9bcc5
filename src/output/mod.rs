//! Output module for exporting enriched records
//!
//! This module handles:
//! - The record sink interface
//! - The semicolon-separated CSV export
//! - Export summaries

mod csv_sink;
mod traits;

pub use csv_sink::CsvSink;
pub use traits::{ExportSummary, OutputError, OutputResult, RecordSink};
