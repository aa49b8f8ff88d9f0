//! Backing store trait and listing cursor
//!
//! The syncer consumes a backing store through this interface only. Calls
//! may block on network I/O; listing is paginated and pulled lazily by
//! [`BackingCursor`] so a sync never materializes a whole subtree.

use crate::status::BackingStatus;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use treesync_common::Result;

/// Options for a backing-store listing
#[derive(Clone, Debug)]
pub struct ListOptions {
    /// List the whole subtree instead of direct children
    pub recursive: bool,
    /// Only return names strictly greater than this relative name
    pub start_after: Option<String>,
    /// Page size hint
    pub page_size: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            start_after: None,
            page_size: 1000,
        }
    }
}

/// An external storage backend holding the authoritative metadata
///
/// `get_status` and `list_page` report absence as data (`None` / empty
/// page), never as an error. Retry policy for transient faults belongs to
/// the implementation, not to callers.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Status of a single path, `None` if it does not exist
    async fn get_status(&self, path: &str) -> Result<Option<BackingStatus>>;

    /// One page of statuses under `path` with relative names strictly
    /// greater than `start_after`, in name order. A page shorter than
    /// `limit` ends the listing.
    async fn list_page(
        &self,
        path: &str,
        recursive: bool,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<BackingStatus>>;

    /// Identifier of the store type, used as fingerprint input
    fn store_type(&self) -> &'static str;
}

/// Lazily paginated listing cursor over a backing store
///
/// Pulls one page at a time; the name of the last entry served feeds the
/// next page request, so an interrupted listing can resume mid-stream.
pub struct BackingCursor {
    store: Arc<dyn BackingStore>,
    path: String,
    options: ListOptions,
    buffer: VecDeque<BackingStatus>,
    last_served: Option<String>,
    exhausted: bool,
}

impl BackingCursor {
    /// Open a cursor over `path` with the given options
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, path: impl Into<String>, options: ListOptions) -> Self {
        Self {
            store,
            path: path.into(),
            last_served: options.start_after.clone(),
            options,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next status, or `None` when the listing is exhausted
    pub async fn next(&mut self) -> Result<Option<BackingStatus>> {
        if self.buffer.is_empty() && !self.exhausted {
            let page = self
                .store
                .list_page(
                    &self.path,
                    self.options.recursive,
                    self.last_served.as_deref(),
                    self.options.page_size,
                )
                .await?;
            if page.len() < self.options.page_size {
                self.exhausted = true;
            }
            self.buffer.extend(page);
        }
        let Some(status) = self.buffer.pop_front() else {
            return Ok(None);
        };
        self.last_served = Some(status.name.clone());
        Ok(Some(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackingStore;

    #[tokio::test]
    async fn test_cursor_paginates() {
        let store = Arc::new(MemBackingStore::new());
        for name in ["a", "b", "c", "d", "e"] {
            store.put_file(&format!("/{name}"), "h", 1);
        }
        let mut cursor = BackingCursor::new(
            store,
            "/",
            ListOptions {
                recursive: false,
                start_after: None,
                page_size: 2,
            },
        );
        let mut names = Vec::new();
        while let Some(status) = cursor.next().await.unwrap() {
            names.push(status.name);
        }
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_cursor_start_after() {
        let store = Arc::new(MemBackingStore::new());
        for name in ["a", "b", "c"] {
            store.put_file(&format!("/{name}"), "h", 1);
        }
        let mut cursor = BackingCursor::new(
            store,
            "/",
            ListOptions {
                recursive: false,
                start_after: Some("a".to_string()),
                page_size: 10,
            },
        );
        let mut names = Vec::new();
        while let Some(status) = cursor.next().await.unwrap() {
            names.push(status.name);
        }
        assert_eq!(names, vec!["b", "c"]);
    }
}
