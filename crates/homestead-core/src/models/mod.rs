//! Data models for Homestead's offline engine

mod change;
mod operation;
mod range;
mod record;
mod sync_conflict;
mod sync_error;

pub use change::{ChangeEntry, ChangeType, RecordEvent};
pub use operation::{NewOperation, OperationId, OperationKind, PendingOperation};
pub use range::{covers, insert_range, TimeRange};
pub use record::{CachedRecord, Payload, RecordId, RemoteRecord, UserId, TEMP_ID_PREFIX};
pub use sync_conflict::{ConflictDecision, ConflictSide, SyncConflict};
pub use sync_error::SyncErrorEntry;

pub(crate) use record::now_millis;
