//! Sync plan evaluation
//!
//! Given a tree entry and the fresh fingerprint of its backing-store
//! counterpart, decide the structural action. Pure; deletion of entries
//! whose counterpart is gone is driven by cursor absence in the merge
//! driver, never by this evaluator.

use treesync_store::Fingerprint;
use treesync_tree::TreeEntry;

/// Short-lived decision value for one entry pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Mutate attributes in place (owner/group/mode) and refresh the
    /// fingerprint
    pub update_metadata: bool,
    /// Delete the tree entry
    pub delete: bool,
    /// Load the entry's metadata from the backing store (with `delete`
    /// this means replace)
    pub load_metadata: bool,
}

impl SyncPlan {
    const NOOP: Self = Self {
        update_metadata: false,
        delete: false,
        load_metadata: false,
    };

    const UPDATE_METADATA: Self = Self {
        update_metadata: true,
        delete: false,
        load_metadata: false,
    };

    const REPLACE: Self = Self {
        update_metadata: false,
        delete: true,
        load_metadata: true,
    };

    /// Whether this plan requires no mutation
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.update_metadata && !self.delete && !self.load_metadata
    }
}

/// Compute the sync plan for an entry whose backing-store counterpart
/// exists with the given fresh fingerprint.
///
/// An entry containing (or being) a nested mount point is owned by that
/// mount's own sync; the parent sync treats it as in-sync regardless of
/// divergence. A file with a missing or unparseable stored fingerprint is
/// treated as content divergence and replaced; a directory in the same
/// state is adopted in place (its subtree is merged separately, deleting
/// it here would throw that work away).
#[must_use]
pub fn compute_sync_plan(
    entry: &TreeEntry,
    fresh: &Fingerprint,
    contains_nested_mount: bool,
) -> SyncPlan {
    if contains_nested_mount {
        return SyncPlan::NOOP;
    }
    let stored = entry
        .fingerprint
        .as_deref()
        .and_then(Fingerprint::parse)
        .unwrap_or_else(Fingerprint::invalid);
    if !stored.is_valid() {
        if entry.is_directory() {
            return SyncPlan::UPDATE_METADATA;
        }
        return SyncPlan::REPLACE;
    }
    if stored == *fresh {
        return SyncPlan::NOOP;
    }
    if stored.matches_content(fresh) {
        return SyncPlan::UPDATE_METADATA;
    }
    SyncPlan::REPLACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use treesync_store::BackingStatus;
    use treesync_tree::{EntryId, EntryKind};

    fn entry_with(fingerprint: Option<String>) -> TreeEntry {
        TreeEntry {
            id: EntryId::from_raw(1),
            name: "a".into(),
            kind: EntryKind::File,
            owner: "alice".into(),
            group: "staff".into(),
            mode: 0o644,
            ttl: None,
            fingerprint,
            is_mount_point: false,
            direct_children_loaded: false,
            persisted: true,
            xattrs: HashMap::new(),
            last_modified_ms: None,
            file: None,
        }
    }

    fn fp(owner: &str, hash: &str) -> Fingerprint {
        Fingerprint::from_status(
            "mem",
            &BackingStatus::file("a", hash, 1).with_owner(owner, "staff"),
        )
    }

    #[test]
    fn test_equal_fingerprints_noop() {
        let fresh = fp("alice", "h1");
        let entry = entry_with(Some(fresh.serialize()));
        assert!(compute_sync_plan(&entry, &fresh, false).is_noop());
    }

    #[test]
    fn test_metadata_only_divergence() {
        let entry = entry_with(Some(fp("alice", "h1").serialize()));
        let plan = compute_sync_plan(&entry, &fp("bob", "h1"), false);
        assert!(plan.update_metadata);
        assert!(!plan.delete);
        assert!(!plan.load_metadata);
    }

    #[test]
    fn test_content_divergence_replaces() {
        let entry = entry_with(Some(fp("alice", "h1").serialize()));
        let plan = compute_sync_plan(&entry, &fp("alice", "h2"), false);
        assert!(plan.delete);
        assert!(plan.load_metadata);
        assert!(!plan.update_metadata);
    }

    #[test]
    fn test_type_divergence_replaces() {
        let entry = entry_with(Some(fp("alice", "h1").serialize()));
        let fresh = Fingerprint::from_status(
            "mem",
            &BackingStatus::directory("a").with_owner("alice", "staff").with_mode(0o644),
        );
        let plan = compute_sync_plan(&entry, &fresh, false);
        assert!(plan.delete && plan.load_metadata);
    }

    #[test]
    fn test_nested_mount_wins_over_divergence() {
        let entry = entry_with(Some(fp("alice", "h1").serialize()));
        assert!(compute_sync_plan(&entry, &fp("bob", "h2"), true).is_noop());
    }

    #[test]
    fn test_missing_stored_fingerprint_replaces_file() {
        let entry = entry_with(None);
        let plan = compute_sync_plan(&entry, &fp("alice", "h1"), false);
        assert!(plan.delete && plan.load_metadata);

        let garbage = entry_with(Some("not a fingerprint".into()));
        let plan = compute_sync_plan(&garbage, &fp("alice", "h1"), false);
        assert!(plan.delete && plan.load_metadata);
    }

    #[test]
    fn test_missing_stored_fingerprint_adopts_directory() {
        let mut entry = entry_with(None);
        entry.kind = EntryKind::Directory;
        let fresh = Fingerprint::from_status("mem", &BackingStatus::directory("a"));
        let plan = compute_sync_plan(&entry, &fresh, false);
        assert!(plan.update_metadata);
        assert!(!plan.delete);
    }

    #[test]
    fn test_never_delete_without_load() {
        // Exhaustive over the evaluator's reachable outputs
        for nested in [false, true] {
            for stored in [None, Some(fp("alice", "h1").serialize())] {
                for fresh in [fp("alice", "h1"), fp("bob", "h1"), fp("alice", "h2")] {
                    let plan = compute_sync_plan(&entry_with(stored.clone()), &fresh, nested);
                    assert!(!(plan.delete && !plan.load_metadata));
                }
            }
        }
    }
}
