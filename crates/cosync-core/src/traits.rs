//! The directory store seam.
//!
//! Every store instance is bound to exactly one base DN; the engine
//! composes all DNs it writes from identifiers plus that base.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::entry::Entry;
use crate::error::SyncResult;

/// Search breadth relative to the search base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base entry itself.
    Base,
    /// Entries one level below the base.
    OneLevel,
    /// The base entry and its whole subtree.
    Subtree,
}

/// One directory store, bound to a base DN and credentials.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// The base DN this store instance is rooted at.
    fn base_dn(&self) -> &str;

    /// Search below `base` (or the store's base DN when `None`).
    ///
    /// Returns a DN-to-entry mapping. `attrs` limits the attributes
    /// returned; `None` returns all of them.
    async fn search(
        &self,
        base: Option<&str>,
        filter: &str,
        attrs: Option<&[&str]>,
        scope: SearchScope,
    ) -> SyncResult<BTreeMap<String, Entry>>;

    /// Search below `relative_base` joined to the store's base DN.
    async fn relative_search(
        &self,
        relative_base: &str,
        filter: &str,
        attrs: Option<&[&str]>,
        scope: SearchScope,
    ) -> SyncResult<BTreeMap<String, Entry>> {
        let base = format!("{},{}", relative_base, self.base_dn());
        self.search(Some(&base), filter, attrs, scope).await
    }

    /// Add a new entry at `dn`.
    async fn add(&self, dn: &str, entry: &Entry) -> SyncResult<()>;

    /// Rewrite the entry at `dn` from `old` to `new`.
    ///
    /// Implementations derive the attribute-level changes from the two
    /// entries; a call where `old` and `new` agree must be a no-op.
    async fn modify(&self, dn: &str, old: &Entry, new: &Entry) -> SyncResult<()>;

    /// Delete the entry at `dn`.
    ///
    /// Whether descendants are removed with it is the store's own
    /// delete semantics.
    async fn delete(&self, dn: &str) -> SyncResult<()>;
}
