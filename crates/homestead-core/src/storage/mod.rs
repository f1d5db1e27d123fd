//! Durable local storage backends.
//!
//! The offline store persists itself as one blob under a single key, so the
//! backends only need byte-oriented get/put/remove with a finite quota.

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::Result;

/// Default quota for durable storage (typical browser local storage limit)
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Byte-oriented key/value facility that survives process restarts.
pub trait DurableStorage: Send + Sync {
    /// Read the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Fails with [`crate::Error::QuotaExceeded`] when the write does not fit.
    fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key` if present
    fn remove(&self, key: &str) -> Result<()>;
}
