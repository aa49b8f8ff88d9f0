//! Configuration types for TreeSync
//!
//! This module defines configuration structures used across components.
//! Loading them from a file or environment is the embedder's concern.

use serde::{Deserialize, Serialize};

/// Syncer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Drop TTL options on metadata loaded from the backing store
    pub ignore_ttl: bool,
    /// Page size hint for backing-store listings
    pub list_page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore_ttl: false,
            list_page_size: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.ignore_ttl);
        assert_eq!(config.list_page_size, 1000);
    }
}
