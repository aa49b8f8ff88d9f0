//! The metadata syncer
//!
//! Entry point and merge driver. The merge is a sequential walk over two
//! name-ordered cursors (tree children, backing-store listing) advanced in
//! lock-step; it must not be parallelized across the ordering, because
//! correctness depends on strict forward progress. Fingerprints and mount
//! resolutions are computed before the edge-write lock is taken, so no
//! backing-store call ever happens under a lock.
//!
//! A changed entry is replaced by delete-then-recreate under one
//! continuous edge-write lock, so no reader can observe the path as
//! transiently absent.

use crate::context::{SyncContext, SyncResult};
use crate::plan::compute_sync_plan;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};
use treesync_common::{Error, Result, SyncConfig, TreePath, cmp_names};
use treesync_store::{BackingCursor, BackingStatus, Fingerprint, ListOptions, MountTable, Resolution};
use treesync_tree::{
    CreateDirectoryOptions, CreateFileOptions, DeleteOptions, InodeTree, LockPattern,
    SetAttributesOptions, TreeIterEntry,
};

/// Directives one reconciliation step hands back to the merge driver
#[derive(Clone, Copy, Debug, Default)]
struct StepResult {
    advance_tree: bool,
    advance_backing: bool,
    skip_children: bool,
    /// Discard backing statuses under the processed name; set alongside
    /// `skip_children` when a nested mount quarantines a whole subtree
    skip_backing: bool,
}

/// How the sync root resolved
enum RootOutcome {
    /// A file, a deleted entry, or a mount-protected entry: no children
    /// to merge
    Leaf,
    /// A directory whose children get merged
    Directory,
}

/// The metadata synchronization engine
pub struct MetadataSyncer {
    tree: Arc<InodeTree>,
    mounts: Arc<MountTable>,
    config: SyncConfig,
}

impl MetadataSyncer {
    #[must_use]
    pub fn new(tree: Arc<InodeTree>, mounts: Arc<MountTable>, config: SyncConfig) -> Self {
        Self {
            tree,
            mounts,
            config,
        }
    }

    /// Synchronize the subtree rooted at `path` with the backing store.
    ///
    /// Reconciles the root itself, then merges children (recursively when
    /// the context says so). On success the directory is marked as having
    /// its children fully loaded. On error or cancellation,
    /// already-applied mutations stay durable and
    /// [`SyncContext::last_processed`] is a valid resume cursor.
    pub async fn sync(&self, path: &TreePath, ctx: &mut SyncContext) -> Result<SyncResult> {
        let resolution = self.mounts.resolve(path)?;
        let root_status = resolution.store.get_status(&resolution.backing_path).await?;
        // Snapshot the root under a read lock so a concurrent edge write
        // cannot interleave with the read
        let root_entry = {
            let _lock = self.tree.lock_path(path, LockPattern::Read);
            self.tree.get_entry(path)
        };
        if root_status.is_none() && root_entry.is_none() {
            return Err(Error::PathNotFound(path.to_string()));
        }
        debug!(
            path = %path,
            in_tree = root_entry.is_some(),
            in_store = root_status.is_some(),
            "syncing"
        );

        let outcome = self.sync_root(ctx, path, root_entry.as_ref(), root_status.as_ref(), &resolution)?;
        if matches!(outcome, RootOutcome::Leaf) {
            return Ok(SyncResult {
                is_directory: false,
                counters: ctx.counters().snapshot(),
            });
        }

        self.sync_children(path, ctx).await?;
        if !ctx.is_cancelled() {
            self.tree.mark_children_loaded(path)?;
        }
        let result = SyncResult {
            is_directory: true,
            counters: ctx.counters().snapshot(),
        };
        debug!(path = %path, counters = ?result.counters, "sync finished");
        Ok(result)
    }

    /// Reconcile the sync root itself, outside the children loop
    fn sync_root(
        &self,
        ctx: &SyncContext,
        path: &TreePath,
        entry: Option<&treesync_tree::TreeEntry>,
        status: Option<&BackingStatus>,
        resolution: &Resolution,
    ) -> Result<RootOutcome> {
        match (entry, status) {
            (None, Some(status)) => {
                let fresh = Fingerprint::from_status(resolution.store.store_type(), status);
                let _lock = self.tree.lock_path(path, LockPattern::WriteEdge);
                self.create_from_status(ctx, path, status, resolution, &fresh)?;
                ctx.counters().inc_creates();
                if status.is_directory() {
                    Ok(RootOutcome::Directory)
                } else {
                    Ok(RootOutcome::Leaf)
                }
            }
            (Some(entry), None) => {
                if self.mount_protected(path, entry.is_mount_point) {
                    ctx.counters().inc_noops();
                    return Ok(RootOutcome::Leaf);
                }
                let _lock = self.tree.lock_path(path, LockPattern::WriteEdge);
                self.delete_entry(path)?;
                ctx.counters().inc_deletes();
                Ok(RootOutcome::Leaf)
            }
            (Some(entry), Some(status)) => {
                self.reconcile_pair(ctx, path, entry, status, resolution)?;
                if status.is_directory() {
                    Ok(RootOutcome::Directory)
                } else {
                    Ok(RootOutcome::Leaf)
                }
            }
            (None, None) => Err(Error::internal(format!(
                "sync root {path} absent on both sides"
            ))),
        }
    }

    /// Merge the children cursors in lock-step
    async fn sync_children(&self, root: &TreePath, ctx: &mut SyncContext) -> Result<()> {
        let root_id = self.tree.entry_id(root)?;
        let resolution = self.mounts.resolve(root)?;
        let root_mount = resolution.mount_path.clone();
        let mut tree_cursor =
            self.tree
                .children_iter(root_id, ctx.recursive, ctx.start_after.clone());
        let mut backing_cursor = BackingCursor::new(
            Arc::clone(&resolution.store),
            resolution.backing_path.clone(),
            ListOptions {
                recursive: ctx.recursive,
                start_after: ctx.start_after.clone(),
                page_size: self.config.list_page_size,
            },
        );

        let mut current_tree = tree_cursor.next();
        let mut current_backing = backing_cursor.next().await?;

        // A paginated listing opened at a resume cursor may re-surface
        // ancestor directories of the resume point; discard everything at
        // or before it on both sides. Prior attempts already committed it.
        if let Some(after) = ctx.start_after.clone() {
            while current_tree
                .as_ref()
                .is_some_and(|e| cmp_names(&e.name, &after) != Ordering::Greater)
            {
                current_tree = tree_cursor.next();
            }
            while current_backing
                .as_ref()
                .is_some_and(|s| cmp_names(&s.name, &after) != Ordering::Greater)
            {
                current_backing = backing_cursor.next().await?;
            }
        }

        while current_tree.is_some() || current_backing.is_some() {
            if ctx.is_cancelled() {
                debug!(root = %root, resume = ?ctx.last_processed(), "sync cancelled");
                break;
            }
            trace!(
                tree = current_tree.as_ref().map(|e| e.name.as_str()),
                backing = current_backing.as_ref().map(|s| s.name.as_str()),
                "merge step"
            );
            let step = self.sync_one(
                ctx,
                root,
                &root_mount,
                current_tree.as_ref(),
                current_backing.as_ref(),
            )?;

            let processed = if step.advance_tree {
                current_tree.as_ref().map(|e| e.name.clone())
            } else {
                current_backing.as_ref().map(|s| s.name.clone())
            };

            if step.skip_children {
                tree_cursor.skip_children();
            }
            if step.advance_tree {
                current_tree = tree_cursor.next();
            }
            if step.advance_backing {
                current_backing = backing_cursor.next().await?;
            }
            if step.skip_backing
                && let Some(prefix) = &processed
            {
                // The backing listing may carry entries under the
                // quarantined name; they belong to the mount's own sync
                let below = format!("{prefix}/");
                while current_backing
                    .as_ref()
                    .is_some_and(|s| s.name.starts_with(&below))
                {
                    current_backing = backing_cursor.next().await?;
                }
            }

            if let Some(name) = processed {
                ctx.set_last_processed(name);
            }
        }
        Ok(())
    }

    /// Reconcile one cursor pair and decide how the cursors advance.
    ///
    /// `root_mount` is the mount serving the sync root; any child path
    /// resolving to a different mount is owned by that mount's own sync
    /// and gets quarantined on both cursors instead of reconciled.
    fn sync_one(
        &self,
        ctx: &SyncContext,
        root: &TreePath,
        root_mount: &TreePath,
        tree_cur: Option<&TreeIterEntry>,
        backing: Option<&BackingStatus>,
    ) -> Result<StepResult> {
        let order = match (tree_cur, backing) {
            (Some(t), Some(b)) => Some(cmp_names(&t.name, &b.name)),
            _ => None,
        };

        // Backing-only: the path exists in the store but not the tree
        if backing.is_some() && (tree_cur.is_none() || order == Some(Ordering::Greater)) {
            let status = backing.ok_or_else(|| Error::internal("backing cursor empty"))?;
            let path = root.join(&status.name)?;
            let resolution = self.mounts.resolve(&path)?;
            // A mount's namespace is populated by its own sync, never
            // from the parent store's listing of the same names
            if resolution.mount_path != *root_mount {
                ctx.counters().inc_noops();
                return Ok(StepResult {
                    advance_backing: true,
                    skip_backing: true,
                    ..Default::default()
                });
            }
            let fresh = Fingerprint::from_status(resolution.store.store_type(), status);
            {
                let _lock = self.tree.lock_path(&path, LockPattern::WriteEdge);
                self.create_from_status(ctx, &path, status, &resolution, &fresh)?;
            }
            ctx.counters().inc_creates();
            return Ok(StepResult {
                advance_backing: true,
                ..Default::default()
            });
        }

        // Tree-only: the path exists in the tree but not the store
        if tree_cur.is_some() && (backing.is_none() || order == Some(Ordering::Less)) {
            let cursor_entry = tree_cur.ok_or_else(|| Error::internal("tree cursor empty"))?;
            let path = root.join(&cursor_entry.name)?;
            let is_mount_point = self
                .tree
                .entry(cursor_entry.id)
                .is_some_and(|e| e.is_mount_point);
            if self.mounts.resolve(&path)?.mount_path != *root_mount
                || self.mount_protected(&path, is_mount_point)
            {
                ctx.counters().inc_noops();
                return Ok(StepResult {
                    advance_tree: true,
                    skip_children: true,
                    skip_backing: true,
                    ..Default::default()
                });
            }
            let _lock = self.tree.lock_path(&path, LockPattern::WriteEdge);
            self.delete_entry(&path)?;
            ctx.counters().inc_deletes();
            // Descendants are gone with the subtree: never visit them
            return Ok(StepResult {
                advance_tree: true,
                skip_children: true,
                ..Default::default()
            });
        }

        // Both present under the same name
        let (cursor_entry, status) = match (tree_cur, backing) {
            (Some(t), Some(b)) => (t, b),
            _ => return Err(Error::internal("merge step with both cursors empty")),
        };
        let path = root.join(&status.name)?;
        let entry_snapshot = self.tree.entry(cursor_entry.id);
        let resolution = self.mounts.resolve(&path)?;
        // A mount point's subtree belongs to that mount's own sync; the
        // parent store's listing of the same name is a different namespace
        if entry_snapshot.as_ref().is_some_and(|e| e.is_mount_point)
            || resolution.mount_path != *root_mount
        {
            ctx.counters().inc_noops();
            return Ok(StepResult {
                advance_tree: true,
                advance_backing: true,
                skip_children: true,
                skip_backing: true,
            });
        }
        match entry_snapshot {
            Some(entry) => {
                self.reconcile_pair(ctx, &path, &entry, status, &resolution)?;
            }
            None => {
                // Deleted by a concurrent operation after the cursor
                // snapshot: the store side still wins
                let fresh = Fingerprint::from_status(resolution.store.store_type(), status);
                let _lock = self.tree.lock_path(&path, LockPattern::WriteEdge);
                self.create_from_status(ctx, &path, status, &resolution, &fresh)?;
                ctx.counters().inc_creates();
            }
        }
        Ok(StepResult {
            advance_tree: true,
            advance_backing: true,
            ..Default::default()
        })
    }

    /// Evaluate and apply the sync plan for an entry whose counterpart
    /// exists, under a single edge-write lock
    fn reconcile_pair(
        &self,
        ctx: &SyncContext,
        path: &TreePath,
        entry: &treesync_tree::TreeEntry,
        status: &BackingStatus,
        resolution: &Resolution,
    ) -> Result<()> {
        let fresh = Fingerprint::from_status(resolution.store.store_type(), status);
        let protected = self.mount_protected(path, entry.is_mount_point);
        let plan = compute_sync_plan(entry, &fresh, protected);
        if plan.is_noop() {
            ctx.counters().inc_noops();
            return Ok(());
        }

        let _lock = self.tree.lock_path(path, LockPattern::WriteEdge);
        if plan.update_metadata {
            self.update_entry_metadata(path, status, &fresh)?;
            ctx.counters().inc_updates();
        } else if plan.delete && plan.load_metadata {
            // Replace under one continuous lock: no absence window
            self.delete_entry(path)?;
            self.create_from_status(ctx, path, status, resolution, &fresh)?;
            ctx.counters().inc_recreates();
        } else {
            return Err(Error::internal(format!("unreachable sync plan {plan:?}")));
        }
        Ok(())
    }

    fn create_from_status(
        &self,
        ctx: &SyncContext,
        path: &TreePath,
        status: &BackingStatus,
        resolution: &Resolution,
        fresh: &Fingerprint,
    ) -> Result<()> {
        let ttl = if self.config.ignore_ttl { None } else { ctx.ttl };
        let mode = effective_mode(status.mode, resolution.shared);
        if status.is_directory() {
            self.tree.create_directory(
                path,
                CreateDirectoryOptions {
                    owner: status.owner.clone(),
                    group: status.group.clone(),
                    mode,
                    ttl,
                    xattrs: status.xattrs.clone(),
                    operation_time_ms: status.last_modified_ms,
                    fingerprint: Some(fresh.serialize()),
                    mount_point: self.mounts.is_mount_point(path),
                    allow_exists: false,
                    write_through: true,
                },
            )?;
        } else {
            let info = status
                .file
                .as_ref()
                .ok_or_else(|| Error::internal(format!("file status without file info: {path}")))?;
            let block_size = info
                .block_size
                .ok_or_else(|| Error::BlockSizeUnknown(path.to_string()))?;
            self.tree.create_file(
                path,
                CreateFileOptions {
                    owner: status.owner.clone(),
                    group: status.group.clone(),
                    mode,
                    block_size,
                    length: info.length,
                    ttl,
                    xattrs: status.xattrs.clone(),
                    operation_time_ms: status.last_modified_ms,
                    fingerprint: Some(fresh.serialize()),
                    write_through: true,
                },
            )?;
        }
        Ok(())
    }

    fn update_entry_metadata(
        &self,
        path: &TreePath,
        status: &BackingStatus,
        fresh: &Fingerprint,
    ) -> Result<()> {
        self.tree.set_attributes(
            path,
            SetAttributesOptions {
                owner: (!status.owner.is_empty()).then(|| status.owner.clone()),
                group: (!status.group.is_empty()).then(|| status.group.clone()),
                mode: Some(status.mode),
                fingerprint: Some(fresh.serialize()),
            },
        )
    }

    /// Recursive, tree-only, unchecked delete, flagged as triggered by a
    /// metadata load
    fn delete_entry(&self, path: &TreePath) -> Result<()> {
        self.tree.delete(
            path,
            DeleteOptions {
                recursive: true,
                unchecked: true,
                metadata_load: true,
            },
        )
    }

    /// Whether a parent sync must keep its hands off this path
    fn mount_protected(&self, path: &TreePath, is_mount_point: bool) -> bool {
        is_mount_point
            || self.mounts.is_mount_point(path)
            || self.mounts.contains_nested_mount(path, true)
    }
}

/// On a shared mount everyone gets the owner's access: OR the owner bits
/// into the "other" bits
const fn effective_mode(mode: u16, shared: bool) -> u16 {
    if shared { mode | ((mode >> 6) & 0o7) } else { mode }
}
