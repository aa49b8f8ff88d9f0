//! TreeSync Tree - The metadata tree
//!
//! This crate owns the virtualized metadata namespace: an arena of entries
//! addressed by id, name-ordered child edges, an edge-scoped path lock
//! service and the mutation facade the syncer (and foreground operations)
//! call. Every mutation is individually journaled before it is applied.

pub mod entry;
pub mod iter;
pub mod journal;
pub mod lock;
pub mod tree;

pub use entry::{EntryId, EntryKind, TreeEntry, TtlAction, TtlOptions};
pub use iter::{TreeIter, TreeIterEntry};
pub use journal::{Journal, JournalEntry, MemJournal, RedbJournal};
pub use lock::{LockPattern, PathLockGuard, PathLockManager};
pub use tree::{
    CreateDirectoryOptions, CreateFileOptions, DeleteOptions, InodeTree, SetAttributesOptions,
};
