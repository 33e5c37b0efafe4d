//! Run statistics.

use serde::Serialize;

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Organizations created in the destination (including their subtrees).
    pub organizations_added: u32,
    /// Organizations whose display name was updated.
    pub organizations_updated: u32,
    /// Organizations deleted from the destination.
    pub organizations_removed: u32,
    /// People added to the destination.
    pub people_added: u32,
    /// People whose entries were modified.
    pub people_updated: u32,
    /// People deleted from the destination.
    pub people_removed: u32,
    /// Groups copied into newly created organizations.
    pub groups_added: u32,
    /// Entries skipped because a required source attribute was absent.
    pub entries_skipped: u32,
    /// People pushed to the secondary notifier.
    pub notified_people: u32,
    /// Groups pushed to the secondary notifier.
    pub notified_groups: u32,
}

impl RunStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total reconciliation write actions issued against the destination.
    ///
    /// Zero on a run where source and destination already agree.
    pub fn writes(&self) -> u32 {
        self.organizations_added
            + self.organizations_updated
            + self.organizations_removed
            + self.people_added
            + self.people_updated
            + self.people_removed
            + self.groups_added
    }
}
