//! `DirectoryStore` implementation over `ldap3`.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use cosync_core::entry::Entry;
use cosync_core::error::{StoreRole, SyncError, SyncResult};
use cosync_core::traits::{DirectoryStore, SearchScope};

use crate::config::LdapConfig;

// noSuchObject: a search base that does not exist yields an empty result,
// not a run failure.
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// One LDAP store, bound to a base DN and bind credentials.
pub struct LdapStore {
    config: LdapConfig,
    role: StoreRole,

    /// Cached connection, lazily established on first use.
    connection: Arc<RwLock<Option<Ldap>>>,
}

impl LdapStore {
    /// Create a new store. Connects lazily on first operation.
    pub fn new(role: StoreRole, config: LdapConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            role,
            connection: Arc::new(RwLock::new(None)),
        })
    }

    /// Which side of the sync this store plays.
    pub fn role(&self) -> StoreRole {
        self.role
    }

    /// Get a bound connection, creating one if necessary.
    async fn get_connection(&self) -> SyncResult<Ldap> {
        {
            let guard = self.connection.read().await;
            if let Some(ref conn) = *guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        {
            let mut guard = self.connection.write().await;
            *guard = Some(conn.clone());
        }

        Ok(conn)
    }

    /// Connect and bind.
    async fn create_connection(&self) -> SyncResult<Ldap> {
        debug!(store = %self.role, uri = %self.config.uri, "connecting to LDAP store");

        let settings = LdapConnSettings::new().set_conn_timeout(std::time::Duration::from_secs(
            self.config.connect_timeout_secs,
        ));

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.uri)
            .await
            .map_err(|e| {
                SyncError::connection_with_source(
                    self.role,
                    &self.config.uri,
                    "failed to connect",
                    e,
                )
            })?;

        // Drive the connection in the background for its whole lifetime.
        let role = self.role;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(store = %role, error = %e, "LDAP connection driver error");
            }
        });

        debug!(store = %self.role, bind_dn = %self.config.bind_dn, "performing simple bind");

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| {
                SyncError::connection_with_source(self.role, &self.config.uri, "bind failed", e)
            })?;

        if result.rc != 0 {
            let message = if result.rc == RC_INVALID_CREDENTIALS {
                format!("invalid credentials for {}", self.config.bind_dn)
            } else {
                format!("bind failed with code {}: {}", result.rc, result.text)
            };
            return Err(SyncError::connection(self.role, &self.config.uri, message));
        }

        info!(store = %self.role, uri = %self.config.uri, "LDAP connection established");

        Ok(ldap)
    }
}

#[async_trait]
impl DirectoryStore for LdapStore {
    fn base_dn(&self) -> &str {
        &self.config.base_dn
    }

    async fn search(
        &self,
        base: Option<&str>,
        filter: &str,
        attrs: Option<&[&str]>,
        scope: SearchScope,
    ) -> SyncResult<BTreeMap<String, Entry>> {
        let mut ldap = self.get_connection().await?;

        let base = base.unwrap_or(&self.config.base_dn);
        let attrs: Vec<String> = match attrs {
            Some(attrs) => attrs.iter().map(|a| (*a).to_string()).collect(),
            None => vec!["*".to_string()],
        };

        let result = ldap
            .search(base, to_ldap_scope(scope), filter, attrs)
            .await
            .map_err(|e| {
                SyncError::store_with_source(format!("search under '{base}' failed"), e)
            })?;

        let (entries, _res) = match result.success() {
            Ok(ok) => ok,
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => {
                debug!(base = %base, "search base does not exist; treating as empty");
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(SyncError::store_with_source(
                    format!("search under '{base}' failed"),
                    e,
                ))
            }
        };

        let mut found = BTreeMap::new();
        for entry in entries {
            let entry = SearchEntry::construct(entry);
            let mut attrs = Entry::new();
            for (name, values) in entry.attrs {
                attrs.set_values(name, values);
            }
            // Binary attributes are out of scope for reconciliation.
            if !entry.bin_attrs.is_empty() {
                debug!(dn = %entry.dn, "ignoring binary attributes");
            }
            found.insert(entry.dn, attrs);
        }
        Ok(found)
    }

    async fn add(&self, dn: &str, entry: &Entry) -> SyncResult<()> {
        let mut ldap = self.get_connection().await?;

        let attrs: Vec<(String, HashSet<String>)> = entry
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect();

        let result = ldap
            .add(dn, attrs)
            .await
            .map_err(|e| SyncError::store_with_source(format!("add of '{dn}' failed"), e))?;
        result
            .success()
            .map_err(|e| SyncError::store_with_source(format!("add of '{dn}' failed"), e))?;

        debug!(store = %self.role, dn = %dn, "added entry");
        Ok(())
    }

    async fn modify(&self, dn: &str, old: &Entry, new: &Entry) -> SyncResult<()> {
        let mods = modify_list(old, new);
        if mods.is_empty() {
            return Ok(());
        }

        let mut ldap = self.get_connection().await?;
        let result = ldap
            .modify(dn, mods)
            .await
            .map_err(|e| SyncError::store_with_source(format!("modify of '{dn}' failed"), e))?;
        result
            .success()
            .map_err(|e| SyncError::store_with_source(format!("modify of '{dn}' failed"), e))?;

        debug!(store = %self.role, dn = %dn, "modified entry");
        Ok(())
    }

    async fn delete(&self, dn: &str) -> SyncResult<()> {
        let mut ldap = self.get_connection().await?;
        let result = ldap
            .delete(dn)
            .await
            .map_err(|e| SyncError::store_with_source(format!("delete of '{dn}' failed"), e))?;
        result
            .success()
            .map_err(|e| SyncError::store_with_source(format!("delete of '{dn}' failed"), e))?;

        debug!(store = %self.role, dn = %dn, "deleted entry");
        Ok(())
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Compute the attribute-level modifications taking `old` to `new`.
///
/// Attributes only in `new` are added, attributes only in `old` are
/// deleted, and attributes whose value sets differ are replaced.
fn modify_list(old: &Entry, new: &Entry) -> Vec<Mod<String>> {
    let mut mods = Vec::new();

    for (name, values) in new.iter() {
        match old.get(name) {
            None => {
                mods.push(Mod::Add(name.clone(), values.iter().cloned().collect()));
            }
            Some(old_values) => {
                let old_set: BTreeSet<&String> = old_values.iter().collect();
                let new_set: BTreeSet<&String> = values.iter().collect();
                if old_set != new_set {
                    mods.push(Mod::Replace(name.clone(), values.iter().cloned().collect()));
                }
            }
        }
    }

    for (name, _) in old.iter() {
        if !new.has(name) {
            mods.push(Mod::Delete(name.clone(), HashSet::new()));
        }
    }

    mods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &[&str])]) -> Entry {
        let mut e = Entry::new();
        for (name, values) in pairs {
            e.set_values(*name, values.iter().map(|v| (*v).to_string()).collect());
        }
        e
    }

    #[test]
    fn equal_entries_produce_no_mods() {
        let e = entry(&[("cn", &["Alice"]), ("mail", &["a@x", "b@x"])]);
        assert!(modify_list(&e, &e.clone()).is_empty());
    }

    #[test]
    fn value_order_does_not_produce_mods() {
        let old = entry(&[("mail", &["a@x", "b@x"])]);
        let new = entry(&[("mail", &["b@x", "a@x"])]);
        assert!(modify_list(&old, &new).is_empty());
    }

    #[test]
    fn new_attribute_becomes_add() {
        let old = entry(&[("cn", &["Alice"])]);
        let new = entry(&[("cn", &["Alice"]), ("mail", &["a@x"])]);
        let mods = modify_list(&old, &new);
        assert_eq!(mods.len(), 1);
        assert!(matches!(&mods[0], Mod::Add(name, _) if name == "mail"));
    }

    #[test]
    fn changed_values_become_replace() {
        let old = entry(&[("cn", &["Alice"])]);
        let new = entry(&[("cn", &["Alice B"])]);
        let mods = modify_list(&old, &new);
        assert_eq!(mods.len(), 1);
        assert!(matches!(&mods[0], Mod::Replace(name, _) if name == "cn"));
    }

    #[test]
    fn removed_attribute_becomes_delete() {
        let old = entry(&[("cn", &["Alice"]), ("mail", &["a@x"])]);
        let new = entry(&[("cn", &["Alice"])]);
        let mods = modify_list(&old, &new);
        assert_eq!(mods.len(), 1);
        assert!(matches!(&mods[0], Mod::Delete(name, values) if name == "mail" && values.is_empty()));
    }

    #[test]
    fn scope_conversion() {
        assert!(matches!(to_ldap_scope(SearchScope::Base), Scope::Base));
        assert!(matches!(to_ldap_scope(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(to_ldap_scope(SearchScope::Subtree), Scope::Subtree));
    }
}
