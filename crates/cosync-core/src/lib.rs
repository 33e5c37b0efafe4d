//! cosync Core Library
//!
//! Shared types for the cosync reconciliation tool.
//!
//! # Modules
//!
//! - [`entry`] - Directory entries as ordered attribute-value maps
//! - [`traits`] - The `DirectoryStore` seam consumed by the engine
//! - [`error`] - Standardized error types (`SyncError`)
//! - [`config`] - YAML configuration loading

pub mod config;
pub mod entry;
pub mod error;
pub mod traits;

// Re-export main types for convenient access
pub use config::{NotifierConfig, StoreConfig, SyncConfig};
pub use entry::Entry;
pub use error::{StoreRole, SyncError, SyncResult};
pub use traits::{DirectoryStore, SearchScope};
