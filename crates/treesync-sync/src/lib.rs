//! TreeSync Sync - The metadata synchronization engine
//!
//! Walks a subtree of the metadata tree in lock-step with a listing of the
//! corresponding backing-store path, detects divergence via fingerprints,
//! and applies the minimal set of create/update/delete mutations to make
//! the tree reflect backing-store truth. Runs concurrently with foreground
//! tree operations, holding at most one edge-write lock at a time, and is
//! resumable after partial failure via a name cursor.

pub mod context;
pub mod plan;
pub mod syncer;

pub use context::{CancellationHandle, SyncContext, SyncCounterSnapshot, SyncCounters, SyncResult};
pub use plan::{SyncPlan, compute_sync_plan};
pub use syncer::MetadataSyncer;
