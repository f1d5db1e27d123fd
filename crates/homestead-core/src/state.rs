//! Sync status shown by clients.

use serde::Serialize;

use crate::models::SyncErrorEntry;

/// Number of recent drain failures carried in a [`SyncStatus`]
pub const STATUS_ERROR_LIMIT: usize = 5;

/// Coarse sync state for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// Local changes are waiting for the next drain
    Pending,
    /// Local changes are waiting and the last attempt to send them failed
    Error,
}

impl SyncState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

/// Snapshot of the engine's sync situation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    pub online: bool,
    pub pending_operations: usize,
    pub last_sync_at: Option<i64>,
    /// Most recent drain failures, newest first
    pub recent_errors: Vec<SyncErrorEntry>,
}

impl SyncStatus {
    /// Derive the display state; `errors` is the history, oldest first.
    pub fn derive(
        online: bool,
        syncing: bool,
        pending_operations: usize,
        last_sync_at: Option<i64>,
        errors: &[SyncErrorEntry],
    ) -> Self {
        let state = if !online {
            SyncState::Offline
        } else if syncing {
            SyncState::Syncing
        } else if pending_operations == 0 {
            SyncState::Synced
        } else if errors.is_empty() {
            SyncState::Pending
        } else {
            SyncState::Error
        };

        Self {
            state,
            online,
            pending_operations,
            last_sync_at,
            recent_errors: errors.iter().rev().take(STATUS_ERROR_LIMIT).cloned().collect(),
        }
    }
}
