//! homestead-core - offline-first sync engine for Homestead
//!
//! Household records (tasks, plants, projects, events) are cached locally,
//! mutations issued while offline are queued in an outbox and replayed when
//! connectivity returns, and pushed changes keep the cache current. Every
//! Homestead client (CLI, desktop, mobile) builds on the [`SyncEngine`]
//! defined here.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod offline;
pub mod remote;
pub mod services;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use connectivity::Connectivity;
pub use error::{Error, Result};
pub use models::{CachedRecord, Payload, RecordId, TimeRange, UserId};
pub use services::SyncEngine;
pub use state::{SyncState, SyncStatus};
