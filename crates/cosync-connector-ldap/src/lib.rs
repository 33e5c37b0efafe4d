//! # LDAP store
//!
//! `ldap3`-backed implementation of the [`cosync_core::DirectoryStore`]
//! seam: scoped search, add, attribute-diffed modify, and delete against
//! one directory store bound to a base DN and bind credentials.
//!
//! ## Example
//!
//! ```ignore
//! use cosync_connector_ldap::{LdapConfig, LdapStore};
//! use cosync_core::StoreRole;
//!
//! let config = LdapConfig::new(
//!     "ldaps://ldap.example.org:636",
//!     "dc=example,dc=org",
//!     "cn=admin,dc=example,dc=org",
//!     "secret",
//! );
//! let store = LdapStore::new(StoreRole::Destination, config)?;
//! ```

pub mod config;
pub mod store;

pub use config::LdapConfig;
pub use store::LdapStore;
