//! TreeSync Common - Shared types and utilities
//!
//! This crate provides the path type, error definitions, and configuration
//! structs used across all TreeSync components.

pub mod config;
pub mod error;
pub mod path;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use path::{TreePath, cmp_names};
