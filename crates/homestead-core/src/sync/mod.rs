//! Synchronisation between the offline store and the remote store.
//!
//! - [`CommandRouter`] sends mutations online first and falls back to the
//!   outbox.
//! - [`SyncDrainer`] replays the outbox when connectivity returns.
//! - [`RealtimeListener`] applies push-channel batches to the cache.
//! - [`ConflictResolver`] settles local/remote pairs by last-write-wins.

mod conflict;
mod drain;
mod realtime;
mod router;

pub use conflict::{decide, ConflictResolver, LWW_STRATEGY};
pub use drain::{DrainReport, DrainSkip, SyncDrainer};
pub use realtime::{
    ChangeFeed, FeedError, FeedMessage, RealtimeListener, Subscription, SubscriptionFilter,
    SubscriptionState,
};
pub use router::CommandRouter;
