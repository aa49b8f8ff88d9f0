//! TreeSync Store - Backing store abstraction
//!
//! This crate defines the interface the syncer consumes from an external
//! storage backend: status snapshots, paginated listings, metadata
//! fingerprints and the mount table that attaches backing-store locations
//! to tree paths. An in-memory implementation backs tests and local
//! development.

pub mod fingerprint;
pub mod mem;
pub mod mount;
pub mod status;
pub mod store;

pub use fingerprint::Fingerprint;
pub use mem::MemBackingStore;
pub use mount::{MountTable, Resolution};
pub use status::{BackingFileInfo, BackingStatus, BackingType};
pub use store::{BackingCursor, BackingStore, ListOptions};
