//! Per-invocation sync context and result types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use treesync_tree::TtlOptions;

/// Cloneable handle for requesting cancellation of a sync invocation
///
/// Cancellation is cooperative: the merge loop finishes the single-path
/// mutation in flight, then stops. The last successfully processed name
/// stays available as the resume cursor.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Live mutation counters for one sync invocation
#[derive(Debug, Default)]
pub struct SyncCounters {
    creates: AtomicU64,
    deletes: AtomicU64,
    updates: AtomicU64,
    recreates: AtomicU64,
    noops: AtomicU64,
}

impl SyncCounters {
    pub(crate) fn inc_creates(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_recreates(&self) {
        self.recreates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_noops(&self) {
        self.noops.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot
    #[must_use]
    pub fn snapshot(&self) -> SyncCounterSnapshot {
        SyncCounterSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            recreates: self.recreates.load(Ordering::Relaxed),
            noops: self.noops.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the mutation counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCounterSnapshot {
    /// Entries created from backing-store state
    pub creates: u64,
    /// Tree-only entries deleted (one per subtree root)
    pub deletes: u64,
    /// In-place metadata updates
    pub updates: u64,
    /// Delete-and-recreate replacements
    pub recreates: u64,
    /// Entries found in sync
    pub noops: u64,
}

impl SyncCounterSnapshot {
    /// Total structural mutations applied
    #[must_use]
    pub const fn mutations(&self) -> u64 {
        self.creates + self.deletes + self.updates + self.recreates
    }

    /// Total entries the merge visited
    #[must_use]
    pub const fn entries_processed(&self) -> u64 {
        self.mutations() + self.noops
    }
}

/// Per-invocation configuration and progress state
///
/// Created once per sync invocation and discarded at its end; the only
/// state that crosses invocations is the resume cursor handed back to the
/// caller via [`SyncContext::last_processed`].
pub struct SyncContext {
    /// Sync the whole subtree instead of direct children
    pub recursive: bool,
    /// Resume cursor: skip everything at or before this relative name
    pub start_after: Option<String>,
    /// TTL options applied to loaded metadata
    pub ttl: Option<TtlOptions>,
    cancellation: CancellationHandle,
    last_processed: Option<String>,
    counters: SyncCounters,
}

impl SyncContext {
    #[must_use]
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            start_after: None,
            ttl: None,
            cancellation: CancellationHandle::new(),
            last_processed: None,
            counters: SyncCounters::default(),
        }
    }

    /// Resume after the given relative name
    #[must_use]
    pub fn with_start_after(mut self, name: impl Into<String>) -> Self {
        self.start_after = Some(name.into());
        self
    }

    /// Apply TTL options to loaded metadata
    #[must_use]
    pub const fn with_ttl(mut self, ttl: TtlOptions) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Handle for cancelling this invocation from another task
    #[must_use]
    pub fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The last fully-processed relative name: a valid resume cursor at
    /// any point the merge is interrupted
    #[must_use]
    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    pub(crate) fn set_last_processed(&mut self, name: impl Into<String>) {
        self.last_processed = Some(name.into());
    }

    /// Live counters for this invocation
    #[must_use]
    pub const fn counters(&self) -> &SyncCounters {
        &self.counters
    }
}

/// Outcome of one sync invocation
#[derive(Clone, Copy, Debug)]
pub struct SyncResult {
    /// Whether the sync root resolved to a directory and its children
    /// were merged
    pub is_directory: bool,
    /// Mutation counters at invocation end
    pub counters: SyncCounterSnapshot,
}

impl SyncResult {
    /// Total entries the merge visited
    #[must_use]
    pub const fn entries_processed(&self) -> u64 {
        self.counters.entries_processed()
    }
}
