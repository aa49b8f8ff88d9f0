//! Tree path type and name ordering
//!
//! Paths in the tree namespace are absolute, slash-separated and validated
//! on construction. The merge algorithm in the syncer depends on a single
//! total order shared by the tree iterator and the backing-store listing;
//! that order is defined here by [`cmp_names`] and nowhere else.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An absolute path in the tree namespace
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreePath(String);

impl TreePath {
    /// Create a new tree path (validates the absolute slash form)
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    /// The root path `/`
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The last path component, or the empty string for the root
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The parent path, or `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Path components, root yields an empty iterator
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Join a relative name (possibly multi-component, as produced by a
    /// recursive listing) onto this path
    pub fn join(&self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidPath(format!(
                "cannot join empty name onto {self}"
            )));
        }
        for component in name.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(Error::InvalidPath(format!(
                    "invalid component {component:?} in {name:?}"
                )));
            }
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// The name of this path relative to an ancestor, if it is one
    #[must_use]
    pub fn relative_to(&self, ancestor: &Self) -> Option<&str> {
        if ancestor.is_root() {
            return self.0.strip_prefix('/').filter(|r| !r.is_empty());
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .filter(|r| !r.is_empty())
    }

    fn validate(path: &str) -> Result<()> {
        if !path.starts_with('/') {
            return Err(Error::InvalidPath(format!("path must be absolute: {path}")));
        }
        if path == "/" {
            return Ok(());
        }
        if path.ends_with('/') {
            return Err(Error::InvalidPath(format!(
                "path must not end with a slash: {path}"
            )));
        }
        for component in path[1..].split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(Error::InvalidPath(format!(
                    "invalid component {component:?} in {path}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath({:?})", self.0)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compare two relative names component-by-component.
///
/// This differs from plain string comparison when a name is a prefix of a
/// deeper one: `"a.txt"` sorts after `"a/b"` as strings but before it per
/// component, which is the order a depth-first tree walk produces. Both
/// cursors and the merge driver must use this ordering.
#[must_use]
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_valid() {
        assert!(TreePath::new("/").is_ok());
        assert!(TreePath::new("/a/b/c").is_ok());
        assert!(TreePath::new("/a.txt").is_ok());
    }

    #[test]
    fn test_path_invalid() {
        assert!(TreePath::new("a/b").is_err()); // Relative
        assert!(TreePath::new("/a//b").is_err()); // Empty component
        assert!(TreePath::new("/a/").is_err()); // Trailing slash
        assert!(TreePath::new("/a/../b").is_err()); // Dot-dot
    }

    #[test]
    fn test_path_name_parent() {
        let p = TreePath::new("/a/b/c").unwrap();
        assert_eq!(p.name(), "c");
        assert_eq!(p.parent().unwrap().as_str(), "/a/b");
        assert_eq!(TreePath::root().name(), "");
        assert!(TreePath::root().parent().is_none());
    }

    #[test]
    fn test_path_join() {
        let root = TreePath::root();
        assert_eq!(root.join("a").unwrap().as_str(), "/a");
        assert_eq!(root.join("a/b").unwrap().as_str(), "/a/b");
        let p = TreePath::new("/x").unwrap();
        assert_eq!(p.join("y").unwrap().as_str(), "/x/y");
        assert!(p.join("").is_err());
        assert!(p.join("a//b").is_err());
    }

    #[test]
    fn test_path_relative_to() {
        let root = TreePath::root();
        let p = TreePath::new("/a/b").unwrap();
        assert_eq!(p.relative_to(&root), Some("a/b"));
        assert_eq!(p.relative_to(&TreePath::new("/a").unwrap()), Some("b"));
        assert_eq!(p.relative_to(&TreePath::new("/ab").unwrap()), None);
    }

    #[test]
    fn test_cmp_names_component_order() {
        assert_eq!(cmp_names("a", "b"), Ordering::Less);
        assert_eq!(cmp_names("a/b", "a/b"), Ordering::Equal);
        // "a.txt" > "a/b" as plain strings ('.' < '/'), but a depth-first
        // walk emits "a", "a/b", "a.txt".
        assert_eq!(cmp_names("a/b", "a.txt"), Ordering::Less);
        assert_eq!(cmp_names("a", "a/b"), Ordering::Less);
    }
}
