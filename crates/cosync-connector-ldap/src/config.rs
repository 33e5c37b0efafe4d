//! LDAP store configuration.

use cosync_core::config::StoreConfig;
use cosync_core::error::{SyncError, SyncResult};

/// Configuration for one LDAP store connection.
#[derive(Clone)]
pub struct LdapConfig {
    /// Connection URI (`ldap://` or `ldaps://`).
    pub uri: String,

    /// Base DN all operations are rooted at.
    pub base_dn: String,

    /// Bind DN for authentication.
    pub bind_dn: String,

    /// Bind password.
    pub bind_password: String,

    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("uri", &self.uri)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***REDACTED***")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl LdapConfig {
    /// Create a new configuration with the default connection timeout.
    pub fn new(
        uri: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: bind_password.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Build a configuration from the loaded store section.
    pub fn from_store(config: &StoreConfig) -> Self {
        Self::new(&config.uri, &config.basedn, &config.binddn, &config.passwd)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if !self.uri.starts_with("ldap://") && !self.uri.starts_with("ldaps://") {
            return Err(SyncError::config_invalid(format!(
                "store URI must start with ldap:// or ldaps://, got '{}'",
                self.uri
            )));
        }
        if self.base_dn.is_empty() {
            return Err(SyncError::config_invalid("store base DN is empty"));
        }
        if self.bind_dn.is_empty() {
            return Err(SyncError::config_invalid("store bind DN is empty"));
        }
        Ok(())
    }
}
