//! End-to-end engine tests against an in-memory directory store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cosync_core::entry::Entry;
use cosync_core::error::{SyncError, SyncResult};
use cosync_core::traits::{DirectoryStore, SearchScope};
use cosync_engine::{Notifier, SyncEngine};

// =========================================================================
// In-memory mock store
// =========================================================================

/// A directory store held in a DN-keyed map, with write-operation
/// counters. Delete removes the whole subtree, like a server with
/// tree-delete semantics.
struct MemoryStore {
    base: String,
    entries: Mutex<BTreeMap<String, Entry>>,
    adds: AtomicUsize,
    mods: AtomicUsize,
    dels: AtomicUsize,
}

impl MemoryStore {
    fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            entries: Mutex::new(BTreeMap::new()),
            adds: AtomicUsize::new(0),
            mods: AtomicUsize::new(0),
            dels: AtomicUsize::new(0),
        }
    }

    fn seed(&self, dn: &str, entry: Entry) {
        self.entries.lock().unwrap().insert(dn.to_string(), entry);
    }

    fn get(&self, dn: &str) -> Option<Entry> {
        self.entries.lock().unwrap().get(dn).cloned()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn write_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
            + self.mods.load(Ordering::SeqCst)
            + self.dels.load(Ordering::SeqCst)
    }
}

fn matches_filter(filter: &str, entry: &Entry) -> bool {
    let inner = filter.trim().trim_start_matches('(').trim_end_matches(')');
    match inner.split_once('=') {
        Some((attribute, "*")) => entry.has(attribute),
        Some((attribute, value)) => entry
            .get(attribute)
            .is_some_and(|values| values.iter().any(|v| v == value)),
        None => false,
    }
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => dn
            .strip_suffix(base)
            .and_then(|prefix| prefix.strip_suffix(','))
            .is_some_and(|rdn| !rdn.contains(',')),
        SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{base}")),
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    fn base_dn(&self) -> &str {
        &self.base
    }

    async fn search(
        &self,
        base: Option<&str>,
        filter: &str,
        _attrs: Option<&[&str]>,
        scope: SearchScope,
    ) -> SyncResult<BTreeMap<String, Entry>> {
        let base = base.unwrap_or(&self.base);
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(dn, entry)| in_scope(dn, base, scope) && matches_filter(filter, entry))
            .map(|(dn, entry)| (dn.clone(), entry.clone()))
            .collect())
    }

    async fn add(&self, dn: &str, entry: &Entry) -> SyncResult<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(dn.to_string(), entry.clone());
        Ok(())
    }

    async fn modify(&self, dn: &str, _old: &Entry, new: &Entry) -> SyncResult<()> {
        self.mods.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(dn.to_string(), new.clone());
        Ok(())
    }

    async fn delete(&self, dn: &str) -> SyncResult<()> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        let suffix = format!(",{dn}");
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| key != dn && !key.ends_with(&suffix));
        Ok(())
    }
}

/// A store whose every operation fails, for connectivity-failure tests.
struct UnreachableStore;

#[async_trait]
impl DirectoryStore for UnreachableStore {
    fn base_dn(&self) -> &str {
        "dc=unreachable"
    }

    async fn search(
        &self,
        _base: Option<&str>,
        _filter: &str,
        _attrs: Option<&[&str]>,
        _scope: SearchScope,
    ) -> SyncResult<BTreeMap<String, Entry>> {
        Err(SyncError::store("store unreachable"))
    }

    async fn add(&self, _dn: &str, _entry: &Entry) -> SyncResult<()> {
        Err(SyncError::store("store unreachable"))
    }

    async fn modify(&self, _dn: &str, _old: &Entry, _new: &Entry) -> SyncResult<()> {
        Err(SyncError::store("store unreachable"))
    }

    async fn delete(&self, _dn: &str) -> SyncResult<()> {
        Err(SyncError::store("store unreachable"))
    }
}

// =========================================================================
// Recording notifier
// =========================================================================

#[derive(Default)]
struct RecordingNotifier {
    people: Mutex<Vec<String>>,
    groups: Mutex<Vec<(String, Vec<String>)>>,
    cleanups: AtomicUsize,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn person(&self, entry: &Entry) -> SyncResult<()> {
        let uid = entry.get_single("uid").unwrap_or("<no uid>").to_string();
        self.people.lock().unwrap().push(uid);
        Ok(())
    }

    async fn group(&self, name: &str, members: &[String]) -> SyncResult<()> {
        self.groups
            .lock()
            .unwrap()
            .push((name.to_string(), members.to_vec()));
        Ok(())
    }

    async fn cleanup(&self) -> SyncResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =========================================================================
// Seed helpers
// =========================================================================

const SRC_BASE: &str = "dc=src";
const DST_BASE: &str = "dc=dst";

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn org_entry(co: &str, description: Option<&str>) -> Entry {
    let mut entry = Entry::new();
    entry.set_values(
        "objectClass",
        values(&["top", "organization", "extensibleObject"]),
    );
    entry.set("o", co);
    if let Some(description) = description {
        entry.set("description", description);
    }
    entry
}

fn dst_org_entry(co: &str, display_name: Option<&str>) -> Entry {
    let mut entry = Entry::new();
    entry.set_values(
        "objectClass",
        values(&["top", "organization", "extensibleObject"]),
    );
    entry.set("o", co);
    if let Some(display_name) = display_name {
        entry.set("displayName", display_name);
    }
    entry
}

fn person_entry(uid: &str) -> Entry {
    let mut entry = Entry::new();
    entry.set_values(
        "objectClass",
        values(&["inetOrgPerson", "person", "posixAccount"]),
    );
    entry.set("uid", uid);
    entry.set("cn", format!("{uid} surname"));
    entry.set("sn", "surname");
    entry.set("homeDirectory", format!("/home/{uid}"));
    entry.set("uidNumber", "1000");
    entry.set("gidNumber", "1000");
    entry
}

fn group_entry(cn: &str, gid: &str, member_dns: &[&str]) -> Entry {
    let mut entry = Entry::new();
    entry.set_values("objectClass", values(&["posixGroup"]));
    entry.set("cn", cn);
    entry.set("gidNumber", gid);
    entry.set_values("member", values(member_dns));
    entry
}

fn seed_src_org(store: &MemoryStore, co: &str, description: Option<&str>) {
    store.seed(&format!("o={co},{SRC_BASE}"), org_entry(co, description));
}

fn seed_src_person(store: &MemoryStore, co: &str, entry: Entry) {
    let uid = entry.get_single("uid").unwrap().to_string();
    store.seed(&format!("uid={uid},ou=People,o={co},{SRC_BASE}"), entry);
}

fn seed_dst_org(store: &MemoryStore, co: &str, display_name: Option<&str>) {
    store.seed(&format!("o={co},{DST_BASE}"), dst_org_entry(co, display_name));
}

fn seed_dst_person(store: &MemoryStore, co: &str, entry: Entry) {
    let uid = entry.get_single("uid").unwrap().to_string();
    store.seed(&format!("uid={uid},ou=People,o={co},{DST_BASE}"), entry);
}

fn engine(src: &Arc<MemoryStore>, dst: &Arc<MemoryStore>) -> SyncEngine {
    SyncEngine::new(src.clone(), dst.clone())
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn scenario_a_new_organization_subtree_is_created() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    seed_src_person(&src, "acme", person_entry("alice"));
    src.seed(
        "cn=admins,ou=Groups,o=acme,dc=src",
        group_entry("admins", "100", &["uid=alice,ou=People,o=acme,dc=src"]),
    );

    let stats = engine(&src, &dst).run().await.unwrap();

    let org = dst.get("o=acme,dc=dst").expect("organization created");
    assert_eq!(org.get_single("displayName"), Some("Acme Corp"));

    assert!(dst.get("ou=People,o=acme,dc=dst").is_some());
    assert!(dst.get("ou=Groups,o=acme,dc=dst").is_some());

    let alice = dst
        .get("uid=alice,ou=People,o=acme,dc=dst")
        .expect("person created");
    let classes = alice.get("objectClass").unwrap();
    for class in ["inetOrgPerson", "person", "posixAccount"] {
        assert!(classes.iter().any(|c| c == class), "missing {class}");
    }

    let admins = dst
        .get("cn=admins,ou=Groups,o=acme,dc=dst")
        .expect("group created");
    assert_eq!(admins.get("memberUid"), Some(&["alice".to_string()][..]));
    assert_eq!(admins.get_single("gidNumber"), Some("100"));

    assert_eq!(stats.organizations_added, 1);
    assert_eq!(stats.people_added, 1);
    assert_eq!(stats.groups_added, 1);
    assert_eq!(stats.entries_skipped, 0);
}

#[tokio::test]
async fn scenario_b_gained_attribute_is_modified_in_place() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    let mut alice = person_entry("alice");
    alice.set("mail", "alice@example.com");
    seed_src_person(&src, "acme", alice);

    seed_dst_org(&dst, "acme", Some("Acme Corp"));
    seed_dst_person(&dst, "acme", person_entry("alice"));

    let stats = engine(&src, &dst).run().await.unwrap();

    let alice = dst.get("uid=alice,ou=People,o=acme,dc=dst").unwrap();
    assert_eq!(alice.get_single("mail"), Some("alice@example.com"));

    assert_eq!(dst.adds.load(Ordering::SeqCst), 0);
    assert_eq!(dst.dels.load(Ordering::SeqCst), 0);
    assert_eq!(dst.mods.load(Ordering::SeqCst), 1);
    assert_eq!(stats.people_updated, 1);
}

#[tokio::test]
async fn scenario_c_organization_only_in_destination_is_deleted() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_dst_org(&dst, "legacy", Some("Legacy"));
    seed_dst_person(&dst, "legacy", person_entry("ghost"));

    let stats = engine(&src, &dst).run().await.unwrap();

    assert!(dst.get("o=legacy,dc=dst").is_none());
    // One delete call; the store's own semantics took the subtree with it.
    assert_eq!(dst.dels.load(Ordering::SeqCst), 1);
    assert_eq!(dst.len(), 0);
    assert_eq!(stats.organizations_removed, 1);
}

#[tokio::test]
async fn second_run_issues_zero_writes() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    let mut alice = person_entry("alice");
    alice.set("sshPublicKey", "ssh-ed25519 AAAA...");
    seed_src_person(&src, "acme", alice);
    src.seed(
        "cn=admins,ou=Groups,o=acme,dc=src",
        group_entry("admins", "100", &["uid=alice,ou=People,o=acme,dc=src"]),
    );

    let engine = engine(&src, &dst);
    engine.run().await.unwrap();
    let writes_after_first = dst.write_count();
    assert!(writes_after_first > 0);

    let stats = engine.run().await.unwrap();
    assert_eq!(stats.writes(), 0);
    assert_eq!(dst.write_count(), writes_after_first);
}

#[tokio::test]
async fn person_missing_uid_number_is_skipped_with_others_processed() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    seed_src_person(&src, "acme", person_entry("alice"));
    let mut bob = person_entry("bob");
    bob.remove("uidNumber");
    seed_src_person(&src, "acme", bob);

    seed_dst_org(&dst, "acme", Some("Acme Corp"));

    let stats = engine(&src, &dst).run().await.unwrap();

    assert!(dst.get("uid=alice,ou=People,o=acme,dc=dst").is_some());
    assert!(dst.get("uid=bob,ou=People,o=acme,dc=dst").is_none());
    assert_eq!(stats.people_added, 1);
    assert_eq!(stats.entries_skipped, 1);
}

#[tokio::test]
async fn no_write_when_only_value_order_differs() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    let mut alice = person_entry("alice");
    alice.set_values(
        "sshPublicKey",
        values(&["ssh-ed25519 KEY1", "ssh-ed25519 KEY2"]),
    );
    seed_src_person(&src, "acme", alice);

    seed_dst_org(&dst, "acme", Some("Acme Corp"));
    let mut existing = person_entry("alice");
    // Same content, different value order.
    existing.set_values(
        "sshPublicKey",
        values(&["ssh-ed25519 KEY2", "ssh-ed25519 KEY1"]),
    );
    existing.set_values(
        "objectClass",
        values(&["posixAccount", "ldapPublicKey", "person", "inetOrgPerson"]),
    );
    seed_dst_person(&dst, "acme", existing);

    let stats = engine(&src, &dst).run().await.unwrap();

    assert_eq!(dst.write_count(), 0);
    assert_eq!(stats.writes(), 0);
}

#[tokio::test]
async fn groups_are_not_reconciled_for_existing_organizations() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    src.seed(
        "cn=admins,ou=Groups,o=acme,dc=src",
        group_entry("admins", "100", &[]),
    );
    seed_dst_org(&dst, "acme", Some("Acme Corp"));

    let stats = engine(&src, &dst).run().await.unwrap();

    assert!(dst.get("cn=admins,ou=Groups,o=acme,dc=dst").is_none());
    assert_eq!(stats.groups_added, 0);
}

#[tokio::test]
async fn display_name_is_updated_when_description_changes() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("New Name"));
    seed_dst_org(&dst, "acme", Some("Old Name"));

    let stats = engine(&src, &dst).run().await.unwrap();

    let org = dst.get("o=acme,dc=dst").unwrap();
    assert_eq!(org.get_single("displayName"), Some("New Name"));
    assert_eq!(stats.organizations_updated, 1);
    assert_eq!(dst.mods.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_source_description_leaves_display_name_alone() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", None);
    seed_dst_org(&dst, "acme", Some("Old Name"));

    let stats = engine(&src, &dst).run().await.unwrap();

    let org = dst.get("o=acme,dc=dst").unwrap();
    assert_eq!(org.get_single("displayName"), Some("Old Name"));
    assert_eq!(stats.writes(), 0);
}

#[tokio::test]
async fn organization_without_o_attribute_is_skipped() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    // Entry found via its RDN but unshapeable: no o attribute.
    let mut broken = Entry::new();
    broken.set_values("objectClass", values(&["top", "organization"]));
    src.seed("o=broken,dc=src", broken);
    seed_src_person(&src, "broken", person_entry("orphan"));

    seed_src_org(&src, "acme", Some("Acme Corp"));

    let stats = engine(&src, &dst).run().await.unwrap();

    assert!(dst.get("o=broken,dc=dst").is_none());
    assert!(dst.get("uid=orphan,ou=People,o=broken,dc=dst").is_none());
    assert!(dst.get("o=acme,dc=dst").is_some());
    assert_eq!(stats.organizations_added, 1);
    assert_eq!(stats.entries_skipped, 1);
}

#[tokio::test]
async fn escaped_organization_rdn_round_trips_on_delete() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    // Name recovered from the escaped RDN: no o attribute on the entry.
    let mut orphaned = Entry::new();
    orphaned.set_values(
        "objectClass",
        values(&["top", "organization", "extensibleObject"]),
    );
    dst.seed("o=\\23retired,dc=dst", orphaned);

    let stats = engine(&src, &dst).run().await.unwrap();

    assert!(dst.get("o=\\23retired,dc=dst").is_none());
    assert_eq!(dst.dels.load(Ordering::SeqCst), 1);
    assert_eq!(stats.organizations_removed, 1);
}

#[tokio::test]
async fn unreachable_store_is_fatal() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    seed_src_org(&src, "acme", Some("Acme Corp"));

    let engine = SyncEngine::new(src, Arc::new(UnreachableStore));
    let err = engine.run().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn notifier_receives_full_push_for_common_organizations() {
    let src = Arc::new(MemoryStore::new(SRC_BASE));
    let dst = Arc::new(MemoryStore::new(DST_BASE));

    seed_src_org(&src, "acme", Some("Acme Corp"));
    seed_src_person(&src, "acme", person_entry("alice"));
    seed_src_person(&src, "acme", person_entry("bob"));
    src.seed(
        "cn=admins,ou=Groups,o=acme,dc=src",
        group_entry("admins", "100", &["uid=alice,ou=People,o=acme,dc=src"]),
    );

    seed_dst_org(&dst, "acme", Some("Acme Corp"));
    seed_dst_person(&dst, "acme", person_entry("alice"));
    seed_dst_person(&dst, "acme", person_entry("bob"));

    let notifier = Arc::new(RecordingNotifier::default());
    let engine = engine(&src, &dst).with_notifier(notifier.clone());
    let stats = engine.run().await.unwrap();

    // Every current source person is pushed, not just the diffed ones.
    let mut people = notifier.people.lock().unwrap().clone();
    people.sort();
    assert_eq!(people, vec!["alice".to_string(), "bob".to_string()]);

    let groups = notifier.groups.lock().unwrap().clone();
    assert_eq!(
        groups,
        vec![("admins".to_string(), vec!["alice".to_string()])]
    );

    assert_eq!(notifier.cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(stats.notified_people, 2);
    assert_eq!(stats.notified_groups, 1);
}
