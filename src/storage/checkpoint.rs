//! Resume checkpoint persistence
//!
//! The checkpoint is a small JSON document written once a region's records
//! have been exported. Saves go through a temporary file; the previous checkpoint is kept
//! as a backup and used when the main file turns out to be unreadable.

use crate::storage::traits::StorageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted crawl progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Region code of the crawl in progress
    pub current_region: Option<String>,

    /// Last zero-based listing page that was fully processed
    pub current_page: u32,

    /// Company ids already handed to the sink, with the time they were seen
    pub processed_ids: BTreeMap<String, DateTime<Utc>>,

    pub completed_regions: Vec<String>,

    pub last_update_time: Option<DateTime<Utc>>,
}

/// Where an interrupted crawl of one region picks up again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// First listing page that still needs fetching
    pub next_page: u32,
    pub processed_ids: HashSet<String>,
}

impl Checkpoint {
    pub fn is_region_complete(&self, region_code: &str) -> bool {
        self.completed_regions.iter().any(|r| r == region_code)
    }

    /// Returns the resume point for `region_code`, if the checkpoint
    /// describes an unfinished crawl of that region
    pub fn resume_point(&self, region_code: &str) -> Option<ResumePoint> {
        if self.current_region.as_deref() != Some(region_code) || self.is_region_complete(region_code)
        {
            return None;
        }

        Some(ResumePoint {
            next_page: self.current_page + 1,
            processed_ids: self.processed_ids.keys().cloned().collect(),
        })
    }

    /// Records that `page` of `region_code` was processed with `ids`
    pub fn record_page<I>(&mut self, region_code: &str, page: u32, ids: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        if self.current_region.as_deref() == Some(region_code) {
            // Page 0 is re-fetched on resume and must not rewind the cursor
            self.current_page = self.current_page.max(page);
        } else {
            self.current_region = Some(region_code.to_string());
            self.current_page = page;
            self.processed_ids.clear();
            self.completed_regions.retain(|r| r != region_code);
        }

        for id in ids {
            self.processed_ids.entry(id).or_insert(now);
        }
    }
}

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
    backup_path: PathBuf,
    tmp_path: PathBuf,
}

impl ProgressStore {
    /// Creates a store writing to `path`
    ///
    /// The backup lives next to it as `<stem>.backup.json`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "progress".to_string());

        let backup_path = path.with_file_name(format!("{}.backup.json", stem));
        let tmp_path = path.with_file_name(format!("{}.json.tmp", stem));

        Self {
            path,
            backup_path,
            tmp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Checkpoint))` - The main file, or the backup if the main
    ///   file is missing or corrupt
    /// * `Ok(None)` - Neither file holds a readable checkpoint
    /// * `Err(StorageError)` - A file exists but could not be read
    pub fn load(&self) -> StorageResult<Option<Checkpoint>> {
        for candidate in [&self.path, &self.backup_path] {
            if !candidate.exists() {
                continue;
            }

            let raw = fs::read_to_string(candidate)?;
            match serde_json::from_str::<Checkpoint>(&raw) {
                Ok(checkpoint) => return Ok(Some(checkpoint)),
                Err(e) => {
                    tracing::warn!("Unreadable checkpoint {}: {}", candidate.display(), e);
                }
            }
        }

        Ok(None)
    }

    /// Loads the checkpoint, or an empty one when none exists
    pub fn load_or_default(&self) -> StorageResult<Checkpoint> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Atomically replaces the checkpoint
    pub fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let mut checkpoint = checkpoint.clone();
        checkpoint.last_update_time = Some(Utc::now());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&checkpoint)?;
        fs::write(&self.tmp_path, json)?;

        if self.path.exists() {
            fs::copy(&self.path, &self.backup_path)?;
        }

        fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }

    /// Records a processed page and saves
    pub fn save_page<I>(&self, region_code: &str, page: u32, ids: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        let mut checkpoint = self.load_or_default()?;
        checkpoint.record_page(region_code, page, ids, Utc::now());
        self.save(&checkpoint)
    }

    /// Marks `region_code` finished and clears its in-progress state
    pub fn mark_region_complete(&self, region_code: &str) -> StorageResult<()> {
        let mut checkpoint = self.load_or_default()?;

        if !checkpoint.is_region_complete(region_code) {
            checkpoint.completed_regions.push(region_code.to_string());
        }

        if checkpoint.current_region.as_deref() == Some(region_code) {
            checkpoint.current_region = None;
            checkpoint.current_page = 0;
            checkpoint.processed_ids.clear();
        }

        self.save(&checkpoint)
    }

    /// Deletes the checkpoint and its backup
    pub fn reset(&self) -> StorageResult<()> {
        for path in [&self.path, &self.backup_path, &self.tmp_path] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
