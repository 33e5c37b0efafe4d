//! REST notifier for pushing reconciled identities to a secondary system.
//!
//! The notifier is fire-and-forget from the engine's point of view:
//! every failure it reports is non-fatal and logged by the caller.

pub mod client;

pub use client::RestNotifier;
