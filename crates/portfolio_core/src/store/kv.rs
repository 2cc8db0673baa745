//! Embedded key-value store backed by SQLite.
//!
//! The whole document is upserted under a single fixed key. SQLite's
//! `max_page_count` gives the store a hard size limit, and hitting it is
//! reported as [`PortfolioError::QuotaExceeded`] so callers can tell the user
//! to export a backup instead of retrying blindly.

use std::future::ready;
use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::error::{PortfolioError, Result};
use crate::fs::BoxFuture;
use crate::migrate::parse_document;
use crate::model::PortfolioDocument;

use super::{PortfolioStore, encode_document};

/// Key the document is stored under.
pub const STORE_KEY: &str = "portfolio-data";

/// SQLite-backed key-value store.
pub struct KvStore {
    conn: Connection,
}

/// Map SQLite failures onto the storage taxonomy.
fn classify(err: rusqlite::Error) -> PortfolioError {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    };

    match code {
        Some(ErrorCode::DiskFull) => PortfolioError::QuotaExceeded,
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase,
        ) => PortfolioError::StoreUnavailable(err.to_string()),
        _ => PortfolioError::Storage(err),
    }
}

impl KvStore {
    /// Open or create the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PortfolioError::StoreUnavailable`] if the database cannot be
    /// opened (missing directory, read-only medium, locked by another process).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(classify)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store for testing.
    ///
    /// Data is lost when the store is dropped.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(classify)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                "#,
            )
            .map_err(classify)
    }

    /// Cap the database at `pages` pages.
    ///
    /// Writes that would grow past the cap fail with `QuotaExceeded`.
    pub fn with_quota_pages(self, pages: u32) -> Result<Self> {
        let applied: i64 = self
            .conn
            .pragma_update_and_check(None, "max_page_count", pages, |row| row.get(0))
            .map_err(classify)?;
        log::debug!("Embedded store capped at {} pages", applied);
        Ok(self)
    }

    /// Read a raw value.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(classify)
    }

    /// Insert or replace a raw value.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map_err(classify)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(classify)?;
        Ok(())
    }

    fn save_document(&self, doc: &PortfolioDocument) -> Result<()> {
        let text = encode_document(doc)?;
        self.put(STORE_KEY, &text)?;
        log::info!("Saved portfolio to embedded store ({} bytes)", text.len());
        Ok(())
    }

    fn load_document(&self) -> Result<Option<PortfolioDocument>> {
        self.get(STORE_KEY)?
            .as_deref()
            .map(parse_document)
            .transpose()
    }
}

impl PortfolioStore for KvStore {
    fn name(&self) -> &str {
        "Local store"
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        Box::pin(ready(self.save_document(doc)))
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        Box::pin(ready(self.load_document()))
    }
}
