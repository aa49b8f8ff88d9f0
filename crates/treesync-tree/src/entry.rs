//! Tree entry types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a tree entry
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// The id of the tree root
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of a tree entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }

    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }
}

/// What happens when an entry's TTL expires
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlAction {
    /// Remove the entry from the tree
    #[default]
    Delete,
    /// Evict cached data, keep the metadata
    Free,
}

/// Time-to-live options carried on an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlOptions {
    /// TTL in milliseconds
    pub ttl_ms: u64,
    /// Action on expiry
    pub action: TtlAction,
}

/// File-specific fields of a tree entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Block size in bytes
    pub block_size: u64,
    /// Content length in bytes
    pub length: u64,
}

/// One entry in the metadata tree
///
/// Mutated only under a path-scoped write lock, created and deleted only
/// through the [`crate::InodeTree`] facade.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: EntryId,
    /// Name within the parent directory (empty for the tree root)
    pub name: String,
    pub kind: EntryKind,
    pub owner: String,
    pub group: String,
    /// POSIX permission bits
    pub mode: u16,
    pub ttl: Option<TtlOptions>,
    /// Serialized backing-store fingerprint recorded at load time
    pub fingerprint: Option<String>,
    /// Whether this entry is a mount point
    pub is_mount_point: bool,
    /// Whether the children of this directory are fully loaded from the
    /// backing store (reads need no sync while this holds)
    pub direct_children_loaded: bool,
    /// Whether the content already resides in the backing store
    pub persisted: bool,
    pub xattrs: HashMap<String, Vec<u8>>,
    /// Operation time in epoch millis, if known
    pub last_modified_ms: Option<u64>,
    /// File fields, `None` for directories
    pub file: Option<FileMeta>,
}

impl TreeEntry {
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    #[must_use]
    pub const fn is_file(&self) -> bool {
        self.kind.is_file()
    }
}
