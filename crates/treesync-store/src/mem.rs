//! In-memory backing store
//!
//! Used by tests and local development. Entries are kept in a `BTreeMap`
//! keyed by path components, so iteration order is exactly the name order
//! the listing contract requires. Pagination is real (pages are cut at
//! `limit`) so resume-across-pages is exercised, and a listing fault can
//! be injected to test partial-failure recovery.

use crate::status::{BackingStatus, BackingType};
use crate::store::BackingStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use treesync_common::{Error, Result};

/// Map key: path split into components. `Vec<String>` ordering is
/// element-wise, matching `treesync_common::cmp_names`.
type PathKey = Vec<String>;

struct Inner {
    entries: BTreeMap<PathKey, BackingStatus>,
    /// Remaining statuses to serve before listing calls fail, if set
    list_budget: Option<u64>,
}

/// In-memory [`BackingStore`] implementation
pub struct MemBackingStore {
    inner: Mutex<Inner>,
    store_type: &'static str,
}

impl MemBackingStore {
    /// Create an empty store containing only the root directory
    #[must_use]
    pub fn new() -> Self {
        Self::with_type("mem")
    }

    /// Create an empty store reporting the given store type
    #[must_use]
    pub fn with_type(store_type: &'static str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(Vec::new(), BackingStatus::directory(""));
        Self {
            inner: Mutex::new(Inner {
                entries,
                list_budget: None,
            }),
            store_type,
        }
    }

    /// Insert a status at `path`, creating missing parent directories
    pub fn insert(&self, path: &str, status: BackingStatus) {
        let key = key_of(path);
        let mut inner = self.inner.lock();
        for depth in 1..key.len() {
            inner
                .entries
                .entry(key[..depth].to_vec())
                .or_insert_with(|| BackingStatus::directory(""));
        }
        inner.entries.insert(key, status);
    }

    /// Insert a file with the given content hash and length
    pub fn put_file(&self, path: &str, content_hash: &str, length: u64) {
        self.insert(path, BackingStatus::file("", content_hash, length));
    }

    /// Insert a directory
    pub fn put_dir(&self, path: &str) {
        self.insert(path, BackingStatus::directory(""));
    }

    /// Remove the entry at `path` and everything under it
    pub fn remove(&self, path: &str) {
        let key = key_of(path);
        let mut inner = self.inner.lock();
        inner
            .entries
            .retain(|k, _| !(k.len() >= key.len() && k[..key.len()] == key[..]));
    }

    /// Fail listing calls after serving `budget` more statuses
    pub fn fail_listing_after(&self, budget: u64) {
        self.inner.lock().list_budget = Some(budget);
    }

    /// Clear an injected listing fault
    pub fn clear_listing_fault(&self) {
        self.inner.lock().list_budget = None;
    }
}

impl Default for MemBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackingStore for MemBackingStore {
    async fn get_status(&self, path: &str) -> Result<Option<BackingStatus>> {
        let key = key_of(path);
        let name = key.last().cloned().unwrap_or_default();
        let inner = self.inner.lock();
        Ok(inner.entries.get(&key).map(|s| s.clone().with_name(name)))
    }

    async fn list_page(
        &self,
        path: &str,
        recursive: bool,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<BackingStatus>> {
        let prefix = key_of(path);
        let start_after: Option<PathKey> = start_after.map(|s| {
            let mut k = prefix.clone();
            k.extend(s.split('/').map(str::to_string));
            k
        });
        let mut inner = self.inner.lock();
        // Start the scan right past the resume point when one is given,
        // otherwise right past the prefix itself.
        let scan_from = start_after.clone().unwrap_or_else(|| prefix.clone());
        let range = inner
            .entries
            .range::<PathKey, _>((Bound::Excluded(&scan_from), Bound::Unbounded));
        let mut out = Vec::new();
        for (key, status) in range {
            if key.len() <= prefix.len() || key[..prefix.len()] != prefix[..] {
                break;
            }
            if !recursive && key.len() != prefix.len() + 1 {
                continue;
            }
            let name = key[prefix.len()..].join("/");
            out.push(status.clone().with_name(name));
            if out.len() == limit {
                break;
            }
        }
        // Charge the fault budget after the scan so a failed call serves
        // nothing from the failing page.
        if let Some(budget) = &mut inner.list_budget {
            if (out.len() as u64) > *budget {
                *budget = 0;
                return Err(Error::Io(std::io::Error::other("injected listing fault")));
            }
            *budget -= out.len() as u64;
        }
        Ok(out)
    }

    fn store_type(&self) -> &'static str {
        self.store_type
    }
}

fn key_of(path: &str) -> PathKey {
    path.split('/')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_status() {
        let store = MemBackingStore::new();
        store.put_file("/a/b", "h1", 5);

        let root = store.get_status("/").await.unwrap().unwrap();
        assert!(root.is_directory());

        // Parent auto-created
        let a = store.get_status("/a").await.unwrap().unwrap();
        assert!(a.is_directory());
        assert_eq!(a.name, "a");

        let b = store.get_status("/a/b").await.unwrap().unwrap();
        assert!(b.is_file());
        assert_eq!(b.name, "b");

        assert!(store.get_status("/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recursive_order() {
        let store = MemBackingStore::new();
        store.put_file("/a/b", "h", 1);
        store.put_file("/a.txt", "h", 1);
        store.put_file("/c", "h", 1);

        let page = store.list_page("/", true, None, 100).await.unwrap();
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        // Component order: "a" descends before "a.txt"
        assert_eq!(names, vec!["a", "a/b", "a.txt", "c"]);
    }

    #[tokio::test]
    async fn test_list_non_recursive() {
        let store = MemBackingStore::new();
        store.put_file("/a/b", "h", 1);
        store.put_file("/c", "h", 1);

        let page = store.list_page("/", false, None, 100).await.unwrap();
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_list_start_after_resurfaces_nothing_before() {
        let store = MemBackingStore::new();
        store.put_file("/a/b/c", "h", 1);
        store.put_file("/d", "h", 1);

        let page = store.list_page("/", true, Some("a/b"), 100).await.unwrap();
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a/b/c", "d"]);
    }

    #[tokio::test]
    async fn test_injected_listing_fault() {
        let store = MemBackingStore::new();
        for name in ["a", "b", "c"] {
            store.put_file(&format!("/{name}"), "h", 1);
        }
        store.fail_listing_after(2);
        assert!(store.list_page("/", true, None, 2).await.is_ok());
        assert!(store.list_page("/", true, Some("b"), 2).await.is_err());
        store.clear_listing_fault();
        assert!(store.list_page("/", true, Some("b"), 2).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_subtree() {
        let store = MemBackingStore::new();
        store.put_file("/x/y", "h", 1);
        store.put_file("/x/z", "h", 1);
        store.put_file("/w", "h", 1);
        store.remove("/x");

        let page = store.list_page("/", true, None, 100).await.unwrap();
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["w"]);
    }
}
