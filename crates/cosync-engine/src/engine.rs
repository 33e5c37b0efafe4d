//! The reconciliation orchestrator.
//!
//! One run: read all organizations from both stores, reconcile the
//! organization set, then per organization reconcile people (and, only
//! at organization-creation time, groups). Entry-shape failures skip the
//! affected entry; store and connectivity failures abort the run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

use cosync_core::entry::Entry;
use cosync_core::error::SyncResult;
use cosync_core::traits::{DirectoryStore, SearchScope};

use crate::generate::{
    generate_container, generate_group, generate_organization, generate_person, member_uids,
};
use crate::layout;
use crate::notifier::Notifier;
use crate::reconcile::reconcile;
use crate::stats::RunStats;

const ORGANIZATION_FILTER: &str = "(objectClass=organization)";
const PERSON_FILTER: &str = "(objectClass=person)";
const GROUP_FILTER: &str = "(objectClass=posixGroup)";

/// A DN-and-entry pair keyed by its identifier.
type Keyed = BTreeMap<String, (String, Entry)>;

/// The reconciliation engine.
///
/// Owns the in-memory snapshots of both stores for the duration of one
/// run; nothing persists across runs.
pub struct SyncEngine {
    source: Arc<dyn DirectoryStore>,
    destination: Arc<dyn DirectoryStore>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SyncEngine {
    /// Create an engine over a source and a destination store.
    pub fn new(source: Arc<dyn DirectoryStore>, destination: Arc<dyn DirectoryStore>) -> Self {
        Self {
            source,
            destination,
            notifier: None,
        }
    }

    /// Attach a secondary sync notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run one full reconciliation pass.
    pub async fn run(&self) -> SyncResult<RunStats> {
        let mut stats = RunStats::new();

        let src_orgs = self.organizations(&*self.source).await?;
        let dst_orgs = self.organizations(&*self.destination).await?;

        let sets = reconcile(&keys(&src_orgs), &keys(&dst_orgs));
        info!(
            new = sets.new.len(),
            removed = sets.removed.len(),
            common = sets.common.len(),
            "reconciling organizations"
        );

        for co in &sets.new {
            let (dn, entry) = &src_orgs[co];
            match self.create_organization(co, dn, entry, &mut stats).await {
                Ok(()) => stats.organizations_added += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(organization = %co, error = %e, "skipping organization creation");
                    stats.entries_skipped += 1;
                }
            }
        }

        for co in &sets.removed {
            let dn = layout::org_dn(self.destination.base_dn(), co);
            self.destination.delete(&dn).await?;
            stats.organizations_removed += 1;
            info!(organization = %co, "removed organization");
        }

        for co in &sets.common {
            let (src_dn, src_entry) = &src_orgs[co];
            let (dst_dn, dst_entry) = &dst_orgs[co];
            self.sync_organization(co, src_dn, src_entry, dst_dn, dst_entry, &mut stats)
                .await?;
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.cleanup().await {
                warn!(error = %e, "notifier cleanup failed");
            }
        }

        info!(
            writes = stats.writes(),
            skipped = stats.entries_skipped,
            "reconciliation run complete"
        );
        Ok(stats)
    }

    /// Read all organizations of a store, keyed by their `co` short name.
    async fn organizations(&self, store: &dyn DirectoryStore) -> SyncResult<Keyed> {
        let found = store
            .search(None, ORGANIZATION_FILTER, None, SearchScope::OneLevel)
            .await?;

        let mut orgs = Keyed::new();
        for (dn, entry) in found {
            let co = entry.get_single("o").map(str::to_string).or_else(|| {
                layout::first_rdn(&dn)
                    .filter(|(attribute, _)| attribute.eq_ignore_ascii_case("o"))
                    .map(|(_, value)| value)
            });
            match co {
                Some(co) => {
                    orgs.insert(co, (dn, entry));
                }
                None => warn!(dn = %dn, "organization entry without o attribute; ignored"),
            }
        }
        Ok(orgs)
    }

    /// Create a new organization subtree in the destination.
    ///
    /// Containers are written before any member entries. An entry-shape
    /// failure on the organization itself aborts this organization (the
    /// caller skips it); failures on individual groups or people only
    /// skip that one entry.
    async fn create_organization(
        &self,
        co: &str,
        src_dn: &str,
        src_entry: &Entry,
        stats: &mut RunStats,
    ) -> SyncResult<()> {
        let entry = generate_organization(src_entry, src_dn)?;
        let base = self.destination.base_dn();

        self.destination
            .add(&layout::org_dn(base, co), &entry)
            .await?;

        self.destination
            .add(
                &layout::groups_dn(base, co),
                &generate_container(layout::GROUPS_OU),
            )
            .await?;

        // First write of this organization: copy groups as-is, no diffing.
        let groups = self.source_groups(co).await?;
        for (dn, group) in &groups {
            let Some(cn) = group
                .get_single("cn")
                .map(str::to_string)
                .or_else(|| layout::first_rdn(dn).map(|(_, value)| value))
            else {
                warn!(dn = %dn, "group entry without cn; skipped");
                stats.entries_skipped += 1;
                continue;
            };
            match generate_group(group, dn, None) {
                Ok(generated) => {
                    self.destination
                        .add(&layout::group_dn(base, co, &cn), &generated)
                        .await?;
                    stats.groups_added += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(dn = %dn, error = %e, "skipping group");
                    stats.entries_skipped += 1;
                }
            }
        }

        self.destination
            .add(
                &layout::people_dn(base, co),
                &generate_container(layout::PEOPLE_OU),
            )
            .await?;

        let people = self.source_people(co).await?;
        for (uid, (dn, person)) in &people {
            match generate_person(person, dn, None) {
                Ok(generated) => {
                    self.destination
                        .add(&layout::person_dn(base, co, uid), &generated)
                        .await?;
                    stats.people_added += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(dn = %dn, error = %e, "skipping person");
                    stats.entries_skipped += 1;
                }
            }
        }

        info!(organization = %co, "created organization subtree");
        Ok(())
    }

    /// Reconcile an organization present in both stores.
    ///
    /// Updates the display name when it diverges, then reconciles the
    /// people set. Groups are not reconciled here: they are only copied
    /// at organization-creation time.
    async fn sync_organization(
        &self,
        co: &str,
        _src_dn: &str,
        src_entry: &Entry,
        dst_dn: &str,
        dst_entry: &Entry,
        stats: &mut RunStats,
    ) -> SyncResult<()> {
        match src_entry.get_single("description") {
            None => {
                info!(organization = %co, "source organization has no description; displayName left unchanged");
            }
            Some(description) => {
                if dst_entry.get_single("displayName") != Some(description) {
                    let mut updated = dst_entry.clone();
                    updated.set("displayName", description.to_string());
                    self.destination.modify(dst_dn, dst_entry, &updated).await?;
                    stats.organizations_updated += 1;
                    info!(organization = %co, "updated display name");
                }
            }
        }

        let base = self.destination.base_dn();
        let src_people = self.source_people(co).await?;
        let dst_people = keyed_by_uid(
            self.destination
                .relative_search(
                    &relative_people_base(co),
                    PERSON_FILTER,
                    None,
                    SearchScope::OneLevel,
                )
                .await?,
        );

        let sets = reconcile(&keys(&src_people), &keys(&dst_people));

        for uid in &sets.new {
            let (dn, person) = &src_people[uid];
            match generate_person(person, dn, None) {
                Ok(generated) => {
                    self.destination
                        .add(&layout::person_dn(base, co, uid), &generated)
                        .await?;
                    stats.people_added += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(dn = %dn, error = %e, "skipping person");
                    stats.entries_skipped += 1;
                }
            }
        }

        for uid in &sets.removed {
            let (dn, _) = &dst_people[uid];
            self.destination.delete(dn).await?;
            stats.people_removed += 1;
        }

        for uid in &sets.common {
            let (src_pdn, src_person) = &src_people[uid];
            let (dst_pdn, dst_person) = &dst_people[uid];
            match generate_person(src_person, src_pdn, Some(dst_person)) {
                Ok(merged) => {
                    if !merged.canonically_equal(dst_person) {
                        self.destination
                            .modify(dst_pdn, dst_person, &merged)
                            .await?;
                        stats.people_updated += 1;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(dn = %src_pdn, error = %e, "skipping person update");
                    stats.entries_skipped += 1;
                }
            }
        }

        if let Some(notifier) = &self.notifier {
            self.notify_organization(co, &src_people, notifier, stats)
                .await?;
        }

        Ok(())
    }

    /// Full re-push of an organization's source people and groups to the
    /// secondary notifier. No diffing; failures are logged and skipped.
    async fn notify_organization(
        &self,
        co: &str,
        src_people: &Keyed,
        notifier: &Arc<dyn Notifier>,
        stats: &mut RunStats,
    ) -> SyncResult<()> {
        for (uid, (_, person)) in src_people {
            match notifier.person(person).await {
                Ok(()) => stats.notified_people += 1,
                Err(e) => warn!(uid = %uid, error = %e, "notifier person upsert failed"),
            }
        }

        let groups = self.source_groups(co).await?;
        for (dn, group) in &groups {
            let Some(cn) = group
                .get_single("cn")
                .map(str::to_string)
                .or_else(|| layout::first_rdn(dn).map(|(_, value)| value))
            else {
                warn!(dn = %dn, "group entry without cn; not pushed");
                continue;
            };
            let members = member_uids(group, dn);
            match notifier.group(&cn, &members).await {
                Ok(()) => stats.notified_groups += 1,
                Err(e) => warn!(group = %cn, error = %e, "notifier group upsert failed"),
            }
        }

        Ok(())
    }

    /// Read an organization's people from the source, keyed by `uid`.
    async fn source_people(&self, co: &str) -> SyncResult<Keyed> {
        Ok(keyed_by_uid(
            self.source
                .relative_search(
                    &relative_people_base(co),
                    PERSON_FILTER,
                    None,
                    SearchScope::OneLevel,
                )
                .await?,
        ))
    }

    /// Read an organization's groups from the source.
    async fn source_groups(&self, co: &str) -> SyncResult<BTreeMap<String, Entry>> {
        self.source
            .relative_search(
                &relative_groups_base(co),
                GROUP_FILTER,
                None,
                SearchScope::OneLevel,
            )
            .await
    }
}

fn relative_people_base(co: &str) -> String {
    format!("ou={},{}", layout::PEOPLE_OU, layout::org_rdn(co))
}

fn relative_groups_base(co: &str) -> String {
    format!("ou={},{}", layout::GROUPS_OU, layout::org_rdn(co))
}

fn keys(map: &Keyed) -> BTreeSet<String> {
    map.keys().cloned().collect()
}

/// Key a DN-to-entry mapping by each person's `uid`, falling back to the
/// DN's `uid` RDN when the attribute was not returned.
fn keyed_by_uid(found: BTreeMap<String, Entry>) -> Keyed {
    let mut keyed = Keyed::new();
    for (dn, entry) in found {
        let uid = entry
            .get_single("uid")
            .map(str::to_string)
            .or_else(|| layout::rdn_uid(&dn));
        match uid {
            Some(uid) => {
                keyed.insert(uid, (dn, entry));
            }
            None => warn!(dn = %dn, "person entry without uid; ignored"),
        }
    }
    keyed
}
