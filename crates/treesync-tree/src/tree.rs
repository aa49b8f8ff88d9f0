//! The metadata tree facade
//!
//! An arena of entries addressed by id with name-ordered child edges. The
//! facade exposes exactly the operations the syncer and foreground callers
//! need: resolve, locked path acquisition, non-recursive create,
//! recursive tree-only delete, in-place attribute mutation, and the
//! children-loaded marker. Each mutation is journaled before it is
//! applied.
//!
//! Locking discipline belongs to callers: mutators are expected to hold
//! the edge-write lock for the path they change (see [`crate::lock`]).
//! The facade itself only guarantees arena-level consistency.

use crate::entry::{EntryId, EntryKind, FileMeta, TreeEntry, TtlOptions};
use crate::iter::TreeIter;
use crate::journal::{Journal, JournalEntry};
use crate::lock::{LockPattern, PathLockGuard, PathLockManager};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use treesync_common::{Error, Result, TreePath};

/// Options for creating a file entry
#[derive(Clone, Debug, Default)]
pub struct CreateFileOptions {
    pub owner: String,
    pub group: String,
    pub mode: u16,
    pub block_size: u64,
    pub length: u64,
    pub ttl: Option<TtlOptions>,
    pub xattrs: HashMap<String, Vec<u8>>,
    pub operation_time_ms: Option<u64>,
    /// Serialized fingerprint recorded at load time
    pub fingerprint: Option<String>,
    /// Content already resides in the backing store (no data copy)
    pub write_through: bool,
}

/// Options for creating a directory entry
#[derive(Clone, Debug, Default)]
pub struct CreateDirectoryOptions {
    pub owner: String,
    pub group: String,
    pub mode: u16,
    pub ttl: Option<TtlOptions>,
    pub xattrs: HashMap<String, Vec<u8>>,
    pub operation_time_ms: Option<u64>,
    pub fingerprint: Option<String>,
    pub mount_point: bool,
    /// Treat an existing directory at the path as success
    pub allow_exists: bool,
    pub write_through: bool,
}

/// Options for a delete
#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteOptions {
    /// Delete a non-empty directory and everything under it
    pub recursive: bool,
    /// Skip precondition re-verification the caller already did
    pub unchecked: bool,
    /// The delete was triggered by a metadata load (sync), recorded for
    /// audit
    pub metadata_load: bool,
}

/// Options for an in-place attribute mutation
#[derive(Clone, Debug, Default)]
pub struct SetAttributesOptions {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u16>,
    /// Refreshed fingerprint
    pub fingerprint: Option<String>,
}

/// The metadata tree
pub struct InodeTree {
    entries: DashMap<EntryId, TreeEntry>,
    children: DashMap<EntryId, BTreeMap<String, EntryId>>,
    next_id: AtomicU64,
    locks: PathLockManager,
    journal: Arc<dyn Journal>,
}

impl InodeTree {
    /// Create a tree containing only the root directory
    #[must_use]
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        let entries = DashMap::new();
        entries.insert(
            EntryId::ROOT,
            TreeEntry {
                id: EntryId::ROOT,
                name: String::new(),
                kind: EntryKind::Directory,
                owner: String::new(),
                group: String::new(),
                mode: 0o755,
                ttl: None,
                fingerprint: None,
                is_mount_point: true,
                direct_children_loaded: false,
                persisted: true,
                xattrs: HashMap::new(),
                last_modified_ms: None,
                file: None,
            },
        );
        let children = DashMap::new();
        children.insert(EntryId::ROOT, BTreeMap::new());
        Self {
            entries,
            children,
            next_id: AtomicU64::new(1),
            locks: PathLockManager::new(),
            journal,
        }
    }

    // ---- Reads ----

    /// Resolve a path to an entry id
    #[must_use]
    pub fn resolve(&self, path: &TreePath) -> Option<EntryId> {
        let mut current = EntryId::ROOT;
        for component in path.components() {
            let edges = self.children.get(&current)?;
            current = *edges.get(component)?;
        }
        Some(current)
    }

    /// Entry id for a path, as an error when absent
    pub fn entry_id(&self, path: &TreePath) -> Result<EntryId> {
        self.resolve(path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))
    }

    /// Snapshot of the entry with the given id
    #[must_use]
    pub fn entry(&self, id: EntryId) -> Option<TreeEntry> {
        self.entries.get(&id).map(|e| e.clone())
    }

    /// Snapshot of the entry at a path
    #[must_use]
    pub fn get_entry(&self, path: &TreePath) -> Option<TreeEntry> {
        self.resolve(path).and_then(|id| self.entry(id))
    }

    /// Whether an entry exists at the path
    #[must_use]
    pub fn exists(&self, path: &TreePath) -> bool {
        self.resolve(path).is_some()
    }

    /// Sorted child names of the directory at `path`
    #[must_use]
    pub fn child_names(&self, path: &TreePath) -> Vec<String> {
        self.resolve(path)
            .and_then(|id| self.children.get(&id))
            .map(|edges| edges.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted `(name, id)` pairs of a directory's children
    pub(crate) fn child_edges(&self, id: EntryId) -> Vec<(String, EntryId)> {
        self.children
            .get(&id)
            .map(|edges| edges.iter().map(|(n, i)| (n.clone(), *i)).collect())
            .unwrap_or_default()
    }

    /// Open a skippable, name-ordered iterator over a directory's children
    #[must_use]
    pub fn children_iter(
        self: &Arc<Self>,
        root: EntryId,
        recursive: bool,
        start_after: Option<String>,
    ) -> TreeIter {
        TreeIter::new(Arc::clone(self), root, recursive, start_after)
    }

    // ---- Locking ----

    /// Acquire the lock for `path` with the given pattern
    pub fn lock_path(&self, path: &TreePath, pattern: LockPattern) -> PathLockGuard {
        self.locks.lock(path, pattern)
    }

    // ---- Mutations (callers hold the edge-write lock) ----

    /// Create a file entry. Non-recursive: the parent must already exist.
    pub fn create_file(&self, path: &TreePath, options: CreateFileOptions) -> Result<EntryId> {
        let (parent_id, name) = self.mutation_target(path)?;
        self.journal.append(&JournalEntry::CreateFile {
            path: path.to_string(),
            owner: options.owner.clone(),
            group: options.group.clone(),
            mode: options.mode,
            block_size: options.block_size,
            length: options.length,
            ttl: options.ttl,
            fingerprint: options.fingerprint.clone(),
        })?;
        let id = self.alloc_id();
        let entry = TreeEntry {
            id,
            name: name.clone(),
            kind: EntryKind::File,
            owner: options.owner,
            group: options.group,
            mode: options.mode,
            ttl: options.ttl,
            fingerprint: options.fingerprint,
            is_mount_point: false,
            direct_children_loaded: false,
            persisted: options.write_through,
            xattrs: options.xattrs,
            last_modified_ms: options.operation_time_ms,
            file: Some(FileMeta {
                block_size: options.block_size,
                length: options.length,
            }),
        };
        self.attach(parent_id, name, entry)?;
        debug!(path = %path, "created file entry");
        Ok(id)
    }

    /// Create a directory entry. Non-recursive: the parent must already
    /// exist.
    pub fn create_directory(
        &self,
        path: &TreePath,
        options: CreateDirectoryOptions,
    ) -> Result<EntryId> {
        if let Some(existing) = self.resolve(path) {
            if options.allow_exists
                && self.entry(existing).is_some_and(|e| e.is_directory())
            {
                return Ok(existing);
            }
            return Err(Error::AlreadyExists(path.to_string()));
        }
        let (parent_id, name) = self.mutation_target(path)?;
        self.journal.append(&JournalEntry::CreateDirectory {
            path: path.to_string(),
            owner: options.owner.clone(),
            group: options.group.clone(),
            mode: options.mode,
            mount_point: options.mount_point,
            ttl: options.ttl,
            fingerprint: options.fingerprint.clone(),
        })?;
        let id = self.alloc_id();
        let entry = TreeEntry {
            id,
            name: name.clone(),
            kind: EntryKind::Directory,
            owner: options.owner,
            group: options.group,
            mode: options.mode,
            ttl: options.ttl,
            fingerprint: options.fingerprint,
            is_mount_point: options.mount_point,
            direct_children_loaded: false,
            persisted: options.write_through,
            xattrs: options.xattrs,
            last_modified_ms: options.operation_time_ms,
            file: None,
        };
        self.children.insert(id, BTreeMap::new());
        self.attach(parent_id, name, entry)?;
        debug!(path = %path, "created directory entry");
        Ok(id)
    }

    /// Delete the entry at `path`, tree-only. With `recursive` the whole
    /// subtree goes; without it a non-empty directory is an error.
    pub fn delete(&self, path: &TreePath, options: DeleteOptions) -> Result<()> {
        if path.is_root() {
            return Err(Error::AccessDenied("cannot delete the tree root".into()));
        }
        let id = self.entry_id(path)?;
        if !options.unchecked
            && !options.recursive
            && self.children.get(&id).is_some_and(|c| !c.is_empty())
        {
            return Err(Error::DirectoryNotEmpty(path.to_string()));
        }
        self.journal.append(&JournalEntry::DeleteRecursive {
            path: path.to_string(),
            metadata_load: options.metadata_load,
        })?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let parent_id = self.entry_id(&parent)?;
        if let Some(mut edges) = self.children.get_mut(&parent_id) {
            edges.remove(path.name());
        }
        self.detach_subtree(id);
        debug!(path = %path, metadata_load = options.metadata_load, "deleted entry");
        Ok(())
    }

    /// In-place attribute mutation plus fingerprint refresh. Does not
    /// change the entry's existence or type.
    pub fn set_attributes(&self, path: &TreePath, options: SetAttributesOptions) -> Result<()> {
        let id = self.entry_id(path)?;
        self.journal.append(&JournalEntry::SetAttributes {
            path: path.to_string(),
            owner: options.owner.clone(),
            group: options.group.clone(),
            mode: options.mode,
            fingerprint: options.fingerprint.clone(),
        })?;
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        if let Some(owner) = options.owner {
            entry.owner = owner;
        }
        if let Some(group) = options.group {
            entry.group = group;
        }
        if let Some(mode) = options.mode {
            entry.mode = mode;
        }
        if let Some(fingerprint) = options.fingerprint {
            entry.fingerprint = Some(fingerprint);
        }
        debug!(path = %path, "updated entry attributes");
        Ok(())
    }

    /// Mark a directory's direct children as fully loaded
    pub fn mark_children_loaded(&self, path: &TreePath) -> Result<()> {
        let id = self.entry_id(path)?;
        if !self.entry(id).is_some_and(|e| e.is_directory()) {
            return Err(Error::InvalidPath(format!("{path} is not a directory")));
        }
        self.journal
            .append(&JournalEntry::MarkChildrenLoaded {
                path: path.to_string(),
            })?;
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.direct_children_loaded = true;
        }
        Ok(())
    }

    // ---- Internals ----

    fn mutation_target(&self, path: &TreePath) -> Result<(EntryId, String)> {
        if path.is_root() {
            return Err(Error::AlreadyExists("/".into()));
        }
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let parent_id = self.entry_id(&parent)?;
        let parent_entry = self
            .entry(parent_id)
            .ok_or_else(|| Error::PathNotFound(parent.to_string()))?;
        if !parent_entry.is_directory() {
            return Err(Error::InvalidPath(format!("{parent} is not a directory")));
        }
        Ok((parent_id, path.name().to_string()))
    }

    fn attach(&self, parent_id: EntryId, name: String, entry: TreeEntry) -> Result<()> {
        let id = entry.id;
        let mut edges = self
            .children
            .get_mut(&parent_id)
            .ok_or_else(|| Error::internal(format!("parent {parent_id} has no edge table")))?;
        if edges.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        edges.insert(name, id);
        drop(edges);
        self.entries.insert(id, entry);
        Ok(())
    }

    fn detach_subtree(&self, id: EntryId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some((_, edges)) = self.children.remove(&current) {
                stack.extend(edges.into_values());
            }
            self.entries.remove(&current);
        }
    }

    fn alloc_id(&self) -> EntryId {
        EntryId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemJournal;

    fn tree() -> (Arc<InodeTree>, Arc<MemJournal>) {
        let journal = Arc::new(MemJournal::new());
        (Arc::new(InodeTree::new(journal.clone())), journal)
    }

    fn dir_opts() -> CreateDirectoryOptions {
        CreateDirectoryOptions {
            mode: 0o755,
            ..Default::default()
        }
    }

    fn file_opts() -> CreateFileOptions {
        CreateFileOptions {
            mode: 0o644,
            block_size: 1024,
            length: 10,
            write_through: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_resolve() {
        let (tree, _) = tree();
        let a = TreePath::new("/a").unwrap();
        let b = TreePath::new("/a/b").unwrap();
        tree.create_directory(&a, dir_opts()).unwrap();
        tree.create_file(&b, file_opts()).unwrap();

        assert!(tree.exists(&a));
        let entry = tree.get_entry(&b).unwrap();
        assert!(entry.is_file());
        assert!(entry.persisted);
        assert_eq!(tree.child_names(&a), vec!["b"]);
    }

    #[test]
    fn test_create_requires_parent() {
        let (tree, _) = tree();
        let deep = TreePath::new("/missing/x").unwrap();
        assert!(tree.create_file(&deep, file_opts()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_existing_conflicts() {
        let (tree, _) = tree();
        let a = TreePath::new("/a").unwrap();
        tree.create_directory(&a, dir_opts()).unwrap();
        assert!(matches!(
            tree.create_directory(&a, dir_opts()),
            Err(Error::AlreadyExists(_))
        ));

        let mut allow = dir_opts();
        allow.allow_exists = true;
        tree.create_directory(&a, allow).unwrap();
    }

    #[test]
    fn test_delete_recursive() {
        let (tree, journal) = tree();
        let x = TreePath::new("/x").unwrap();
        tree.create_directory(&x, dir_opts()).unwrap();
        tree.create_file(&TreePath::new("/x/y").unwrap(), file_opts())
            .unwrap();
        tree.create_file(&TreePath::new("/x/z").unwrap(), file_opts())
            .unwrap();

        tree.delete(
            &x,
            DeleteOptions {
                recursive: true,
                unchecked: true,
                metadata_load: true,
            },
        )
        .unwrap();
        assert!(!tree.exists(&x));
        assert!(!tree.exists(&TreePath::new("/x/y").unwrap()));

        // One delete record for the whole subtree
        let deletes: Vec<_> = journal
            .entries()
            .into_iter()
            .filter(|e| matches!(e, JournalEntry::DeleteRecursive { .. }))
            .collect();
        assert_eq!(deletes.len(), 1);
    }

    #[test]
    fn test_delete_root_denied() {
        let (tree, _) = tree();
        assert!(matches!(
            tree.delete(&TreePath::root(), DeleteOptions::default()),
            Err(Error::AccessDenied(_))
        ));
    }

    #[test]
    fn test_delete_non_empty_checked() {
        let (tree, _) = tree();
        let x = TreePath::new("/x").unwrap();
        tree.create_directory(&x, dir_opts()).unwrap();
        tree.create_file(&TreePath::new("/x/y").unwrap(), file_opts())
            .unwrap();
        assert!(matches!(
            tree.delete(&x, DeleteOptions::default()),
            Err(Error::DirectoryNotEmpty(_))
        ));
    }

    #[test]
    fn test_set_attributes() {
        let (tree, _) = tree();
        let a = TreePath::new("/a").unwrap();
        tree.create_file(&a, file_opts()).unwrap();
        tree.set_attributes(
            &a,
            SetAttributesOptions {
                owner: Some("alice".into()),
                mode: Some(0o600),
                fingerprint: Some("fp".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let entry = tree.get_entry(&a).unwrap();
        assert_eq!(entry.owner, "alice");
        assert_eq!(entry.mode, 0o600);
        assert_eq!(entry.fingerprint.as_deref(), Some("fp"));
        assert!(entry.is_file());
    }

    #[test]
    fn test_mark_children_loaded() {
        let (tree, _) = tree();
        let root = TreePath::root();
        assert!(!tree.get_entry(&root).unwrap().direct_children_loaded);
        tree.mark_children_loaded(&root).unwrap();
        assert!(tree.get_entry(&root).unwrap().direct_children_loaded);

        let f = TreePath::new("/f").unwrap();
        tree.create_file(&f, file_opts()).unwrap();
        assert!(tree.mark_children_loaded(&f).is_err());
    }
}
