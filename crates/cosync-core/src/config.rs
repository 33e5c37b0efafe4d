//! YAML configuration loading.
//!
//! Required keys are resolved by explicit dotted-path lookup over the
//! parsed document so a missing key aborts the run before any directory
//! I/O, reported with its full path (for example `ldap.dst.basedn`).

use serde_yaml::Value;
use std::path::Path;

use crate::error::{SyncError, SyncResult};

/// Connection settings for one directory store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Connection URI, e.g. `ldaps://ldap.example.org:636`.
    pub uri: String,
    /// Base DN all of the store's entries live under.
    pub basedn: String,
    /// Bind DN used for authentication.
    pub binddn: String,
    /// Bind password.
    pub passwd: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("basedn", &self.basedn)
            .field("binddn", &self.binddn)
            .field("passwd", &"***REDACTED***")
            .finish()
    }
}

/// Settings for the optional secondary sync notifier.
#[derive(Clone)]
pub struct NotifierConfig {
    /// Base URL of the notifier endpoint.
    pub url: String,
    /// API key presented on every request.
    pub key: String,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("url", &self.url)
            .field("key", &"***REDACTED***")
            .finish()
    }
}

/// Root configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The authoritative store.
    pub src: StoreConfig,
    /// The store being reconciled.
    pub dst: StoreConfig,
    /// Secondary sync target; `None` means no secondary sync.
    pub notifier: Option<NotifierConfig>,
}

impl SyncConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| SyncError::ConfigRead {
                path: path.as_ref().display().to_string(),
                source: e,
            })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> SyncResult<Self> {
        let doc: Value = serde_yaml::from_str(content)
            .map_err(|e| SyncError::config_invalid(format!("not valid YAML: {e}")))?;

        let notifier = match lookup(&doc, "notifier") {
            None => None,
            Some(_) => Some(NotifierConfig {
                url: require(&doc, "notifier.url")?.to_string(),
                key: require(&doc, "notifier.key")?.to_string(),
            }),
        };

        Ok(SyncConfig {
            src: store_config(&doc, "ldap.src")?,
            dst: store_config(&doc, "ldap.dst")?,
            notifier,
        })
    }
}

fn store_config(doc: &Value, prefix: &str) -> SyncResult<StoreConfig> {
    Ok(StoreConfig {
        uri: require(doc, &format!("{prefix}.uri"))?.to_string(),
        basedn: require(doc, &format!("{prefix}.basedn"))?.to_string(),
        binddn: require(doc, &format!("{prefix}.binddn"))?.to_string(),
        passwd: require(doc, &format!("{prefix}.passwd"))?.to_string(),
    })
}

/// Walk a dotted key path through nested mappings.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

/// Resolve a required string value, reporting the full dotted path when absent.
fn require<'a>(doc: &'a Value, path: &str) -> SyncResult<&'a str> {
    lookup(doc, path)
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::missing_config(path))
}
