//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Deduplicated, status-tracked link storage
//! - Upserted article storage
//! - Aggregate statistics over both tables

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::StorageConfig;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SQLite database file on disk
    Sqlite,

    /// Private in-memory SQLite database, discarded at exit
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(StorageError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens the configured storage backend
///
/// Connection failures are returned to the caller; nothing is retried.
pub fn open_storage(config: &StorageConfig) -> StorageResult<SqliteStorage> {
    match config.backend.parse::<Backend>()? {
        Backend::Sqlite => SqliteStorage::new(Path::new(&config.database_path)),
        Backend::Memory => SqliteStorage::new_in_memory(),
    }
}

/// Computes the deterministic secondary key for a url (hex-encoded SHA-256)
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracted content for one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub content: String,
    pub pub_date: String,
    pub source: String,
    pub created_at: String,
}

impl Article {
    /// Creates an article stamped with the current time
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        pub_date: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            pub_date: pub_date.into(),
            source: source.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn url_hash(&self) -> String {
        url_hash(&self.url)
    }
}

/// Aggregate counts over the links and articles tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub total_articles: u64,
    pub articles_by_source: BTreeMap<String, u64>,
    pub total_links: u64,
    pub links_by_status: BTreeMap<String, u64>,
}

impl StoreStatistics {
    /// Count of links in the given status
    pub fn links_with_status(&self, status: crate::state::LinkStatus) -> u64 {
        self.links_by_status
            .get(status.to_db_string())
            .copied()
            .unwrap_or(0)
    }
}
