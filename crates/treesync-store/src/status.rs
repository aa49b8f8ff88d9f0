//! Backing store status snapshots
//!
//! A [`BackingStatus`] is an immutable snapshot of one backing-store entry
//! taken at listing time. It carries no ownership relation to the tree; it
//! is the source of truth the tree is reconciled towards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of a backing-store entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackingType {
    File,
    Directory,
}

impl BackingType {
    /// Name used inside fingerprints
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// File-specific fields of a status snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingFileInfo {
    /// Content hash reported by the store (etag, checksum, ...)
    pub content_hash: String,
    /// Content length in bytes
    pub length: u64,
    /// Block size, if the store reports one
    pub block_size: Option<u64>,
}

/// Immutable snapshot of a backing-store entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingStatus {
    /// Name relative to the listing root (multi-component for recursive
    /// listings, e.g. `a/b/c`)
    pub name: String,
    /// Entry type
    pub kind: BackingType,
    /// Owner reported by the store (may be empty)
    pub owner: String,
    /// Group reported by the store (may be empty)
    pub group: String,
    /// POSIX permission bits
    pub mode: u16,
    /// Last modification time in epoch millis, if known
    pub last_modified_ms: Option<u64>,
    /// Extended attributes
    pub xattrs: HashMap<String, Vec<u8>>,
    /// File fields, `None` for directories
    pub file: Option<BackingFileInfo>,
}

impl BackingStatus {
    /// Create a directory status
    #[must_use]
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BackingType::Directory,
            owner: String::new(),
            group: String::new(),
            mode: 0o755,
            last_modified_ms: None,
            xattrs: HashMap::new(),
            file: None,
        }
    }

    /// Create a file status
    #[must_use]
    pub fn file(name: impl Into<String>, content_hash: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            kind: BackingType::File,
            owner: String::new(),
            group: String::new(),
            mode: 0o644,
            last_modified_ms: None,
            xattrs: HashMap::new(),
            file: Some(BackingFileInfo {
                content_hash: content_hash.into(),
                length,
                block_size: Some(64 * 1024 * 1024),
            }),
        }
    }

    /// Set the owner and group
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>, group: impl Into<String>) -> Self {
        self.owner = owner.into();
        self.group = group.into();
        self
    }

    /// Set the permission bits
    #[must_use]
    pub const fn with_mode(mut self, mode: u16) -> Self {
        self.mode = mode;
        self
    }

    /// Set the last modification time
    #[must_use]
    pub const fn with_last_modified(mut self, epoch_ms: u64) -> Self {
        self.last_modified_ms = Some(epoch_ms);
        self
    }

    /// Set the block size (files only; `None` marks it unknown)
    #[must_use]
    pub fn with_block_size(mut self, block_size: Option<u64>) -> Self {
        if let Some(file) = &mut self.file {
            file.block_size = block_size;
        }
        self
    }

    /// Replace the relative name (used when re-rooting a listing)
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether this entry is a file
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, BackingType::File)
    }

    /// Whether this entry is a directory
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.kind, BackingType::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_builders() {
        let dir = BackingStatus::directory("a").with_owner("alice", "staff");
        assert!(dir.is_directory());
        assert_eq!(dir.owner, "alice");
        assert!(dir.file.is_none());

        let file = BackingStatus::file("a/b", "h1", 42)
            .with_mode(0o600)
            .with_last_modified(1000);
        assert!(file.is_file());
        assert_eq!(file.mode, 0o600);
        assert_eq!(file.file.as_ref().unwrap().length, 42);
    }
}
