//! Skippable tree iterator
//!
//! Depth-first, name-ordered walk over a directory's children. Implemented
//! as an explicit stack state machine so pause, resume and subtree
//! skipping stay observable. Child lists are snapshotted per directory as
//! the walk descends; entries deleted behind the cursor are simply not
//! revisited.

use crate::entry::{EntryId, EntryKind};
use crate::tree::InodeTree;
use std::cmp::Ordering;
use std::sync::Arc;
use treesync_common::cmp_names;

/// One step of a tree walk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeIterEntry {
    /// Name relative to the iteration root (multi-component when deep)
    pub name: String,
    pub id: EntryId,
    pub kind: EntryKind,
}

struct Frame {
    prefix: String,
    children: Vec<(String, EntryId)>,
    idx: usize,
}

/// Lazy, name-ordered, skippable iterator over tree children
pub struct TreeIter {
    tree: Arc<InodeTree>,
    recursive: bool,
    start_after: Option<String>,
    stack: Vec<Frame>,
    /// Directory emitted by the previous `next`, expanded lazily so
    /// `skip_children` can cancel the descent
    pending: Option<(String, EntryId)>,
}

impl TreeIter {
    pub(crate) fn new(
        tree: Arc<InodeTree>,
        root: EntryId,
        recursive: bool,
        start_after: Option<String>,
    ) -> Self {
        let children = tree.child_edges(root);
        Self {
            tree,
            recursive,
            start_after,
            stack: vec![Frame {
                prefix: String::new(),
                children,
                idx: 0,
            }],
            pending: None,
        }
    }

    /// Advance to the next entry, or `None` when the walk is done
    pub fn next(&mut self) -> Option<TreeIterEntry> {
        if let Some((prefix, id)) = self.pending.take() {
            let children = self.tree.child_edges(id);
            self.stack.push(Frame {
                prefix,
                children,
                idx: 0,
            });
        }
        loop {
            let step = {
                let frame = self.stack.last_mut()?;
                if frame.idx < frame.children.len() {
                    frame.idx += 1;
                    let (name, id) = frame.children[frame.idx - 1].clone();
                    Some((frame.prefix.clone(), name, id))
                } else {
                    None
                }
            };
            let Some((prefix, name, id)) = step else {
                self.stack.pop();
                continue;
            };
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            // Entry deleted behind the cursor: nothing to emit
            let Some(entry) = self.tree.entry(id) else {
                continue;
            };
            let is_dir = entry.is_directory();

            if let Some(after) = &self.start_after {
                if cmp_names(&rel, after) != Ordering::Greater {
                    // Already committed by a previous attempt. Descend
                    // without emitting when the resume point lies at or
                    // below this directory.
                    if self.recursive
                        && is_dir
                        && (after == &rel || after.starts_with(&format!("{rel}/")))
                    {
                        let children = self.tree.child_edges(id);
                        self.stack.push(Frame {
                            prefix: rel,
                            children,
                            idx: 0,
                        });
                    }
                    continue;
                }
            }

            if self.recursive && is_dir {
                self.pending = Some((rel.clone(), id));
            }
            return Some(TreeIterEntry {
                name: rel,
                id,
                kind: entry.kind,
            });
        }
    }

    /// Do not descend into the directory returned by the last `next`
    pub fn skip_children(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemJournal;
    use crate::tree::{CreateDirectoryOptions, CreateFileOptions};
    use treesync_common::TreePath;

    fn sample_tree() -> Arc<InodeTree> {
        let tree = Arc::new(InodeTree::new(Arc::new(MemJournal::new())));
        for dir in ["/a", "/a/c"] {
            tree.create_directory(
                &TreePath::new(dir).unwrap(),
                CreateDirectoryOptions::default(),
            )
            .unwrap();
        }
        for file in ["/a/b", "/a/c/d", "/e"] {
            tree.create_file(
                &TreePath::new(file).unwrap(),
                CreateFileOptions {
                    block_size: 1,
                    ..Default::default()
                },
            )
            .unwrap();
        }
        tree
    }

    fn names(iter: &mut TreeIter) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(entry) = iter.next() {
            out.push(entry.name);
        }
        out
    }

    #[test]
    fn test_recursive_preorder() {
        let tree = sample_tree();
        let mut iter = tree.children_iter(EntryId::ROOT, true, None);
        assert_eq!(names(&mut iter), vec!["a", "a/b", "a/c", "a/c/d", "e"]);
    }

    #[test]
    fn test_non_recursive() {
        let tree = sample_tree();
        let mut iter = tree.children_iter(EntryId::ROOT, false, None);
        assert_eq!(names(&mut iter), vec!["a", "e"]);
    }

    #[test]
    fn test_skip_children() {
        let tree = sample_tree();
        let mut iter = tree.children_iter(EntryId::ROOT, true, None);
        assert_eq!(iter.next().unwrap().name, "a");
        iter.skip_children();
        assert_eq!(names(&mut iter), vec!["e"]);
    }

    #[test]
    fn test_start_after_descends_into_resume_point() {
        let tree = sample_tree();
        let mut iter = tree.children_iter(EntryId::ROOT, true, Some("a/c".to_string()));
        assert_eq!(names(&mut iter), vec!["a/c/d", "e"]);
    }

    #[test]
    fn test_start_after_skips_committed_prefix() {
        let tree = sample_tree();
        let mut iter = tree.children_iter(EntryId::ROOT, true, Some("a/c/d".to_string()));
        assert_eq!(names(&mut iter), vec!["e"]);
    }
}
