//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::LinkStatus;
use crate::storage::{Article, StoreStatistics};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for link/article store implementations
///
/// Implementations must tolerate concurrent callers: every method takes `&self` and each
/// call is atomic on its own. No isolation is provided across calls.
pub trait Storage: Send + Sync {
    /// Stores discovered links for a source, skipping urls that already exist
    ///
    /// # Returns
    ///
    /// The number of genuinely new rows inserted
    fn store_links(&self, urls: &[String], source: &str) -> StorageResult<usize>;

    /// Upserts articles by url
    ///
    /// A row that fails to store is logged and skipped; only successful rows are counted.
    fn store_articles(&self, articles: &[Article]) -> StorageResult<usize>;

    /// Gets pending link urls, optionally filtered by source and capped by limit
    fn get_pending_links(
        &self,
        source: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<String>>;

    /// Sets the status of a link; absent urls are ignored
    fn update_link_status(&self, url: &str, status: LinkStatus) -> StorageResult<()>;

    /// Gets the status of a link, if it exists
    fn get_link_status(&self, url: &str) -> StorageResult<Option<LinkStatus>>;

    /// Gets a stored article by url
    fn get_article(&self, url: &str) -> StorageResult<Option<Article>>;

    /// Gets aggregate counts over links and articles
    fn get_statistics(&self) -> StorageResult<StoreStatistics>;
}
