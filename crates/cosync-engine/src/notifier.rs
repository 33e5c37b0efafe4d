//! The secondary sync seam.
//!
//! An optional legacy identity platform that mirrors people and groups.
//! It is not authoritative and sees no diffing: the engine re-pushes
//! every current source person and group per organization per run, and
//! failures are logged without affecting the run.

use async_trait::async_trait;

use cosync_core::entry::Entry;
use cosync_core::error::SyncResult;

/// A secondary sync target consuming person/group upserts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Upsert a person from its source attributes.
    async fn person(&self, entry: &Entry) -> SyncResult<()>;

    /// Upsert a group with its resolved member uid list.
    async fn group(&self, name: &str, members: &[String]) -> SyncResult<()>;

    /// Called once at the end of a run.
    async fn cleanup(&self) -> SyncResult<()>;
}
