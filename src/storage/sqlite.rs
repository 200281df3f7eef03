//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::LinkStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{url_hash, Article, StoreStatistics};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The single connection is guarded by a mutex so worker threads and tokio tasks can
/// share one store; each trait call holds the lock for one statement or one batch.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; missing parent directories are created
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates a private in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl Storage for SqliteStorage {
    fn store_links(&self, urls: &[String], source: &str) -> StorageResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (url, url_hash, source, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for url in urls {
                match stmt.execute(params![
                    url,
                    url_hash(url),
                    source,
                    LinkStatus::Pending.to_db_string(),
                    now
                ]) {
                    Ok(changed) => inserted += changed,
                    Err(e) => tracing::warn!("Failed to store link {}: {}", url, e),
                }
            }
        }

        tx.commit()?;
        tracing::debug!("Stored {} new links for {}", inserted, source);
        Ok(inserted)
    }

    fn store_articles(&self, articles: &[Article]) -> StorageResult<usize> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut stored = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO articles
                 (url, url_hash, title, content, pub_date, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(url) DO UPDATE SET
                     title = excluded.title,
                     content = excluded.content,
                     pub_date = excluded.pub_date,
                     source = excluded.source,
                     updated_at = ?8",
            )?;

            for article in articles {
                match stmt.execute(params![
                    article.url,
                    article.url_hash(),
                    article.title,
                    article.content,
                    article.pub_date,
                    article.source,
                    article.created_at,
                    now
                ]) {
                    Ok(changed) => stored += changed,
                    Err(e) => tracing::warn!("Failed to store article {}: {}", article.url, e),
                }
            }
        }

        tx.commit()?;
        tracing::debug!("Stored {} articles", stored);
        Ok(stored)
    }

    fn get_pending_links(
        &self,
        source: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(
            "SELECT url FROM links
             WHERE status = ?1 AND (?2 IS NULL OR source = ?2)
             ORDER BY id
             LIMIT ?3",
        )?;

        let urls = stmt
            .query_map(
                params![LinkStatus::Pending.to_db_string(), source, limit],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(urls)
    }

    fn update_link_status(&self, url: &str, status: LinkStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "UPDATE links SET status = ?1, updated_at = ?2 WHERE url = ?3",
            params![status.to_db_string(), now, url],
        )?;
        Ok(())
    }

    fn get_link_status(&self, url: &str) -> StorageResult<Option<LinkStatus>> {
        let conn = self.conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM links WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.and_then(|s| LinkStatus::from_db_string(&s)))
    }

    fn get_article(&self, url: &str) -> StorageResult<Option<Article>> {
        let conn = self.conn()?;
        let article = conn
            .query_row(
                "SELECT url, title, content, pub_date, source, created_at
                 FROM articles WHERE url = ?1",
                params![url],
                |row| {
                    Ok(Article {
                        url: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        pub_date: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        source: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(article)
    }

    fn get_statistics(&self) -> StorageResult<StoreStatistics> {
        let conn = self.conn()?;

        let total_articles: i64 =
            conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        let total_links: i64 = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;

        let articles_by_source = group_counts(
            &conn,
            "SELECT source, COUNT(*) FROM articles GROUP BY source",
        )?;
        let links_by_status =
            group_counts(&conn, "SELECT status, COUNT(*) FROM links GROUP BY status")?;

        Ok(StoreStatistics {
            total_articles: total_articles as u64,
            articles_by_source,
            total_links: total_links as u64,
            links_by_status,
        })
    }
}

/// Runs a two-column `key, COUNT(*)` query into a map
fn group_counts(conn: &Connection, query: &str) -> StorageResult<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row?;
        counts.insert(key, count as u64);
    }

    Ok(counts)
}
