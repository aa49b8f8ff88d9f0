//! Edge-scoped path locks
//!
//! A lock protects one parent→child edge, identified by the child's full
//! path, so sibling paths stay concurrently accessible. Guards are RAII:
//! the lock is released on every exit path, including unwinds.

use dashmap::DashMap;
use parking_lot::RwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use std::sync::Arc;
use treesync_common::TreePath;

type EdgeLock = Arc<RwLock<()>>;

/// Locking pattern for a path acquisition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockPattern {
    /// Shared read access
    Read,
    /// Exclusive access to the edge being changed
    WriteEdge,
}

/// RAII guard for an acquired path lock
pub struct PathLockGuard {
    _guard: GuardInner,
}

enum GuardInner {
    Read(ArcRwLockReadGuard<parking_lot::RawRwLock, ()>),
    Write(ArcRwLockWriteGuard<parking_lot::RawRwLock, ()>),
}

/// Lock service handing out edge locks keyed by path
#[derive(Default)]
pub struct PathLockManager {
    locks: DashMap<String, EdgeLock>,
}

impl PathLockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the edge lock for `path`, blocking while a conflicting
    /// holder is active. Blocking here is back-pressure, not an error.
    pub fn lock(&self, path: &TreePath, pattern: LockPattern) -> PathLockGuard {
        let lock = self
            .locks
            .entry(path.as_str().to_string())
            .or_default()
            .clone();
        let guard = match pattern {
            LockPattern::Read => GuardInner::Read(lock.read_arc()),
            LockPattern::WriteEdge => GuardInner::Write(lock.write_arc()),
        };
        PathLockGuard { _guard: guard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_locks_shared() {
        let manager = PathLockManager::new();
        let path = TreePath::new("/a").unwrap();
        let _first = manager.lock(&path, LockPattern::Read);
        let _second = manager.lock(&path, LockPattern::Read);
    }

    #[test]
    fn test_sibling_edges_independent() {
        let manager = PathLockManager::new();
        let _a = manager.lock(&TreePath::new("/a").unwrap(), LockPattern::WriteEdge);
        // A write lock on /a must not block /b
        let _b = manager.lock(&TreePath::new("/b").unwrap(), LockPattern::WriteEdge);
    }

    #[test]
    fn test_write_lock_released_on_drop() {
        let manager = PathLockManager::new();
        let path = TreePath::new("/a").unwrap();
        drop(manager.lock(&path, LockPattern::WriteEdge));
        let _again = manager.lock(&path, LockPattern::WriteEdge);
    }
}
