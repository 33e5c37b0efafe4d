//! # Reconciliation engine
//!
//! Brings a destination directory store into agreement with a source
//! store over a three-tier hierarchy: organizations, then each
//! organization's people and groups.
//!
//! The pieces, leaves first:
//!
//! - [`reconcile`] - three-way set comparison (new / removed / common),
//!   applied identically at every hierarchy level
//! - [`generate`] - pure entry generators shaping a source record into
//!   a destination record
//! - [`layout`] - deterministic DN composition and RDN parsing
//! - [`engine`] - the orchestrator issuing create/update/delete through
//!   the [`cosync_core::DirectoryStore`] seam
//! - [`notifier`] - optional secondary sync target, fire-and-forget
//!
//! A run is stateless: both stores are re-read each invocation and every
//! write is derived from a diff, so re-running after a failure is safe.

pub mod engine;
pub mod generate;
pub mod layout;
pub mod notifier;
pub mod reconcile;
pub mod stats;

pub use engine::SyncEngine;
pub use notifier::Notifier;
pub use reconcile::{reconcile, ReconcileSets};
pub use stats::RunStats;
