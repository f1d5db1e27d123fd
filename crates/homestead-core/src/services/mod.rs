//! Service objects wiring the offline store, router, drainer and listener
//! together for clients.

mod engine;

pub use engine::SyncEngine;
