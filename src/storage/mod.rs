//! Storage module for persisting harvest state
//!
//! This module handles everything that outlives a single run:
//! - SQLite persistence of the validated proxy pool
//! - The JSON resume checkpoint

mod checkpoint;
mod schema;
mod sqlite;
mod traits;

pub use checkpoint::{Checkpoint, ProgressStore, ResumePoint};
pub use sqlite::SqliteProxyStore;
pub use traits::{ProxyStore, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens the proxy pool database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteProxyStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_proxy_store(path: &Path) -> StorageResult<SqliteProxyStore> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteProxyStore::new(path)
}
