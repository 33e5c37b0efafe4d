//! Three-way set reconciliation.

use std::collections::BTreeSet;

/// The partition of source and destination identifier sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSets {
    /// Present in source, absent in destination: to be created.
    pub new: BTreeSet<String>,
    /// Present in destination, absent in source: to be removed.
    pub removed: BTreeSet<String>,
    /// Present in both: to be compared and possibly updated.
    pub common: BTreeSet<String>,
}

/// Partition two identifier sets into new, removed, and common.
///
/// The three sets are pairwise disjoint and their union covers exactly
/// `source ∪ destination`.
pub fn reconcile(source: &BTreeSet<String>, destination: &BTreeSet<String>) -> ReconcileSets {
    ReconcileSets {
        new: source.difference(destination).cloned().collect(),
        removed: destination.difference(source).cloned().collect(),
        common: source.intersection(destination).cloned().collect(),
    }
}
