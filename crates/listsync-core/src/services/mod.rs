//! High-level operations over a remote store.

mod sync;

pub use sync::{SyncPlan, SyncReport, SyncService, SyncSummary};
