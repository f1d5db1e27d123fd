//! `SQLite`-backed storage backend

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{DurableStorage, DEFAULT_QUOTA_BYTES};
use crate::error::{Error, Result};

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Key/value table in a local `SQLite` file
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    quota: usize,
}

impl SqliteStorage {
    /// Open storage at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Override the byte quota (defaults to 5 MiB)
    #[must_use]
    pub const fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota: DEFAULT_QUOTA_BYTES,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("sqlite storage lock poisoned".to_string()))
    }
}

impl DurableStorage for SqliteStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.lock()?;
        let others: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(value)), 0) FROM kv_store WHERE key != ?",
            params![key],
            |row| row.get(0),
        )?;
        let needed = usize::try_from(others).unwrap_or(usize::MAX).saturating_add(value.len());
        if needed > self.quota {
            return Err(Error::QuotaExceeded {
                needed,
                limit: self.quota,
            });
        }

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}

/// Configure `SQLite` pragmas; WAL is best-effort (not available in memory)
fn configure(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get::<_, String>(0))
        .ok();
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    Ok(())
}

/// Run all pending migrations
fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
            params![CURRENT_VERSION, chrono::Utc::now().timestamp_millis()],
        )?;
        tracing::debug!("Applied storage migration v{CURRENT_VERSION}");
    }

    Ok(())
}
