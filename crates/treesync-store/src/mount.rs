//! Mount table
//!
//! Maps tree paths to backing-store locations. A mount point attaches a
//! distinct backing-store location to a tree path and is sync-isolated
//! from its parent: a parent sync must never touch metadata owned by a
//! nested mount.

use crate::store::BackingStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use treesync_common::{Error, Result, TreePath};

struct Mount {
    backing_path: String,
    store: Arc<dyn BackingStore>,
    shared: bool,
}

/// Result of resolving a tree path against the mount table
pub struct Resolution {
    /// Tree path of the mount serving this path. Two paths served by
    /// different mounts never belong to the same sync.
    pub mount_path: TreePath,
    /// Path in the backing store's own namespace
    pub backing_path: String,
    /// The backing store serving this path
    pub store: Arc<dyn BackingStore>,
    /// Whether the mount is shared (owner bits extend to everyone)
    pub shared: bool,
}

/// Table of mounted backing-store locations, keyed by tree path
pub struct MountTable {
    mounts: RwLock<BTreeMap<Vec<String>, Mount>>,
}

impl MountTable {
    /// Create an empty mount table
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Attach a backing-store location at `path`
    pub fn add_mount(
        &self,
        path: &TreePath,
        backing_path: impl Into<String>,
        store: Arc<dyn BackingStore>,
        shared: bool,
    ) -> Result<()> {
        let key: Vec<String> = path.components().map(str::to_string).collect();
        let mut mounts = self.mounts.write();
        if mounts.contains_key(&key) {
            return Err(Error::AlreadyExists(format!("mount point {path}")));
        }
        let backing_path = backing_path.into();
        info!(
            path = %path,
            backing_path = %backing_path,
            store = store.store_type(),
            shared,
            "mounted backing store"
        );
        mounts.insert(
            key,
            Mount {
                backing_path,
                store,
                shared,
            },
        );
        Ok(())
    }

    /// Resolve a tree path to its backing-store location (longest prefix)
    pub fn resolve(&self, path: &TreePath) -> Result<Resolution> {
        let key: Vec<&str> = path.components().collect();
        let mounts = self.mounts.read();
        let mut best: Option<(usize, &Mount)> = None;
        for (mount_key, mount) in mounts.iter() {
            if mount_key.len() <= key.len()
                && mount_key.iter().zip(&key).all(|(a, b)| a == b)
                && best.is_none_or(|(len, _)| mount_key.len() > len)
            {
                best = Some((mount_key.len(), mount));
            }
        }
        let Some((prefix_len, mount)) = best else {
            return Err(Error::MountNotFound(path.to_string()));
        };
        let mount_path = if prefix_len == 0 {
            TreePath::root()
        } else {
            TreePath::new(format!("/{}", key[..prefix_len].join("/")))?
        };
        let remainder = key[prefix_len..].join("/");
        let backing_path = if remainder.is_empty() {
            mount.backing_path.clone()
        } else if mount.backing_path.ends_with('/') {
            format!("{}{remainder}", mount.backing_path)
        } else {
            format!("{}/{remainder}", mount.backing_path)
        };
        Ok(Resolution {
            mount_path,
            backing_path,
            store: Arc::clone(&mount.store),
            shared: mount.shared,
        })
    }

    /// Whether `path` is itself a mount point
    #[must_use]
    pub fn is_mount_point(&self, path: &TreePath) -> bool {
        let key: Vec<String> = path.components().map(str::to_string).collect();
        self.mounts.read().contains_key(&key)
    }

    /// Whether any mount point lies strictly below `path`
    #[must_use]
    pub fn contains_nested_mount(&self, path: &TreePath, recursive: bool) -> bool {
        let key: Vec<&str> = path.components().collect();
        self.mounts.read().keys().any(|mount_key| {
            mount_key.len() > key.len()
                && mount_key.iter().zip(&key).all(|(a, b)| a == b)
                && (recursive || mount_key.len() == key.len() + 1)
        })
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackingStore;

    fn table() -> MountTable {
        let table = MountTable::new();
        table
            .add_mount(&TreePath::root(), "/", Arc::new(MemBackingStore::new()), false)
            .unwrap();
        table
            .add_mount(
                &TreePath::new("/mnt/nested").unwrap(),
                "/data",
                Arc::new(MemBackingStore::with_type("s3")),
                true,
            )
            .unwrap();
        table
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let table = table();
        let r = table.resolve(&TreePath::new("/a/b").unwrap()).unwrap();
        assert_eq!(r.backing_path, "/a/b");
        assert_eq!(r.store.store_type(), "mem");
        assert!(r.mount_path.is_root());

        let r = table
            .resolve(&TreePath::new("/mnt/nested/x").unwrap())
            .unwrap();
        assert_eq!(r.backing_path, "/data/x");
        assert_eq!(r.store.store_type(), "s3");
        assert!(r.shared);
        assert_eq!(r.mount_path.as_str(), "/mnt/nested");
    }

    #[test]
    fn test_resolve_no_mount() {
        let table = MountTable::new();
        assert!(table.resolve(&TreePath::root()).is_err());
    }

    #[test]
    fn test_mount_point_queries() {
        let table = table();
        assert!(table.is_mount_point(&TreePath::root()));
        assert!(table.is_mount_point(&TreePath::new("/mnt/nested").unwrap()));
        assert!(!table.is_mount_point(&TreePath::new("/mnt").unwrap()));

        assert!(table.contains_nested_mount(&TreePath::new("/mnt").unwrap(), true));
        assert!(table.contains_nested_mount(&TreePath::root(), true));
        assert!(!table.contains_nested_mount(&TreePath::root(), false));
        assert!(!table.contains_nested_mount(&TreePath::new("/mnt/nested").unwrap(), true));
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let table = table();
        let err = table
            .add_mount(&TreePath::root(), "/", Arc::new(MemBackingStore::new()), false)
            .unwrap_err();
        assert!(err.is_structural());
    }
}
