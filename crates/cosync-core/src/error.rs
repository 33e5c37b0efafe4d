//! Error types for a sync run.
//!
//! Fatal errors (configuration, connectivity, store operations) terminate
//! the run; entry-shape errors are recovered locally by skipping the
//! affected entry.

use thiserror::Error;

/// Which of the two stores an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    /// The authoritative store being read from.
    Source,
    /// The store being brought into agreement with the source.
    Destination,
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreRole::Source => write!(f, "source"),
            StoreRole::Destination => write!(f, "destination"),
        }
    }
}

/// Error that can occur during a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required configuration key is absent.
    ///
    /// `path` is the full dotted key path, e.g. `ldap.dst.basedn`.
    #[error("missing configuration key: {path}")]
    MissingConfig { path: String },

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is malformed.
    #[error("invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// A store could not be reached or refused the bind.
    #[error("cannot connect to {store} store at {uri}: {message}")]
    Connection {
        store: StoreRole,
        uri: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A directory operation against a store failed.
    #[error("directory operation failed: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A required attribute is absent from a source record.
    ///
    /// Local to the affected entry; the run continues with all others.
    #[error("missing required attribute '{attribute}' on {dn}")]
    MissingAttribute { attribute: String, dn: String },

    /// The secondary notifier failed an upsert. Never fatal to the run.
    #[error("notifier error: {message}")]
    Notifier { message: String },
}

impl SyncError {
    /// Check whether this error terminates the run.
    ///
    /// Entry-shape and notifier errors are recovered locally; everything
    /// else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::MissingAttribute { .. } | SyncError::Notifier { .. }
        )
    }

    // Convenience constructors

    /// Create a missing-configuration error for a dotted key path.
    pub fn missing_config(path: impl Into<String>) -> Self {
        SyncError::MissingConfig { path: path.into() }
    }

    /// Create an invalid-configuration error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        SyncError::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Create a connection error without an underlying source.
    pub fn connection(
        store: StoreRole,
        uri: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::Connection {
            store,
            uri: uri.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error carrying the underlying library error.
    pub fn connection_with_source(
        store: StoreRole,
        uri: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::Connection {
            store,
            uri: uri.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store operation error.
    pub fn store(message: impl Into<String>) -> Self {
        SyncError::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a store operation error carrying the underlying library error.
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an entry-shape error naming the attribute and the source DN.
    pub fn missing_attribute(attribute: impl Into<String>, dn: impl Into<String>) -> Self {
        SyncError::MissingAttribute {
            attribute: attribute.into(),
            dn: dn.into(),
        }
    }

    /// Create a notifier error.
    pub fn notifier(message: impl Into<String>) -> Self {
        SyncError::Notifier {
            message: message.into(),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
