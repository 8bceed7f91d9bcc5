//! Semicolon-separated CSV export
//!
//! Files are UTF-8 with a byte-order mark so spreadsheet tools pick the
//! encoding up, and are named after the region and the export date.

use crate::output::traits::{OutputResult, RecordSink};
use crate::record::EnrichedRecord;
use crate::region::Region;
use chrono::{Datelike, Local, NaiveDate};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes one CSV file per region into a directory
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `firmenregister_<region slug>_<year>_<month>_<day>.csv`, unpadded
    pub fn file_name(region: &Region, date: NaiveDate) -> String {
        format!(
            "firmenregister_{}_{}_{}_{}.csv",
            region.slug(),
            date.year(),
            date.month(),
            date.day()
        )
    }

    /// `name` in the sink directory, suffixed `_2`, `_3`, ... if taken
    fn unused_path(&self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if !path.exists() {
            return path;
        }

        let stem = name.trim_end_matches(".csv");
        (2..)
            .map(|n| self.dir.join(format!("{}_{}.csv", stem, n)))
            .find(|p| !p.exists())
            .unwrap_or(path)
    }

    fn write_file(
        path: &Path,
        header: &[&str],
        records: &[EnrichedRecord],
    ) -> OutputResult<()> {
        let mut file = File::create(path)?;
        file.write_all(BOM)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        writer.write_record(header)?;
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl RecordSink for CsvSink {
    fn write(
        &self,
        region: &Region,
        header: &[&str],
        records: &[EnrichedRecord],
    ) -> OutputResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.unused_path(&Self::file_name(region, Local::now().date_naive()));
        Self::write_file(&path, header, records)?;

        tracing::info!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }
}
