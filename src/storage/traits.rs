//! Storage traits and error types
//!
//! This module defines the trait interface for proxy persistence backends
//! and the error type shared by every storage component.

use crate::proxy::ProxyCandidate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for proxy pool persistence backends
///
/// The pool shares one store between the fetch path and background
/// refreshes, so implementations must be safe behind `&self`.
pub trait ProxyStore: Send + Sync {
    /// Loads every persisted candidate in rotation order
    fn load(&self) -> StorageResult<Vec<ProxyCandidate>>;

    /// Replaces the persisted pool with `candidates`, keeping their order
    fn replace_all(&self, candidates: &[ProxyCandidate]) -> StorageResult<()>;

    /// Permanently removes the candidate with this exact address and port
    ///
    /// Returns true if a row was removed.
    fn remove(&self, address: &str, port: u16) -> StorageResult<bool>;
}
