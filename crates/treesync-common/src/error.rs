//! Error types for TreeSync
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for TreeSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for TreeSync
#[derive(Debug, Error)]
pub enum Error {
    // Path errors
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    // Backing store errors
    #[error("backing store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no mount covers path: {0}")]
    MountNotFound(String),

    #[error("unknown block size for {0}")]
    BlockSizeUnknown(String),

    // Persistence errors
    #[error("journal error: {0}")]
    Journal(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a journal error
    pub fn journal(msg: impl Into<String>) -> Self {
        Self::Journal(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound(_) | Self::MountNotFound(_))
    }

    /// Check if this is a structural precondition error that a caller
    /// cannot safely paper over
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists(_)
                | Self::DirectoryNotEmpty(_)
                | Self::InvalidPath(_)
                | Self::AccessDenied(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::PathNotFound("/a".into()).is_not_found());
        assert!(!Error::AlreadyExists("/a".into()).is_not_found());
    }

    #[test]
    fn test_error_structural() {
        assert!(Error::AlreadyExists("/a".into()).is_structural());
        assert!(Error::DirectoryNotEmpty("/a".into()).is_structural());
        assert!(!Error::PathNotFound("/a".into()).is_structural());
    }
}
