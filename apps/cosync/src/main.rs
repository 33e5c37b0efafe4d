//! cosync — one-shot LDAP directory reconciliation.
//!
//! Reads a YAML configuration describing a source and a destination
//! directory, reconciles the destination against the source, and exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cosync_connector_ldap::{LdapConfig, LdapStore};
use cosync_core::{StoreRole, SyncConfig, SyncResult};
use cosync_engine::SyncEngine;
use cosync_notifier::RestNotifier;

const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "cosync", version, about = "Reconcile an LDAP directory against a source directory")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "COSYNC_CONFIG", default_value = "cosync.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "reconciliation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> SyncResult<()> {
    let config = SyncConfig::from_file(&cli.config)?;

    let source = LdapStore::new(StoreRole::Source, LdapConfig::from_store(&config.src))?;
    let destination = LdapStore::new(StoreRole::Destination, LdapConfig::from_store(&config.dst))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.src.uri,
        destination = %config.dst.uri,
        "starting reconciliation"
    );

    let mut engine = SyncEngine::new(Arc::new(source), Arc::new(destination));
    if let Some(notifier_config) = &config.notifier {
        let notifier = RestNotifier::new(&notifier_config.url, &notifier_config.key, NOTIFIER_TIMEOUT)?;
        engine = engine.with_notifier(Arc::new(notifier));
        info!(url = %notifier_config.url, "secondary sync notifier enabled");
    }

    let stats = engine.run().await?;

    info!(
        organizations_added = stats.organizations_added,
        organizations_updated = stats.organizations_updated,
        organizations_removed = stats.organizations_removed,
        people_added = stats.people_added,
        people_updated = stats.people_updated,
        people_removed = stats.people_removed,
        groups_added = stats.groups_added,
        entries_skipped = stats.entries_skipped,
        notified_people = stats.notified_people,
        notified_groups = stats.notified_groups,
        "reconciliation finished"
    );

    Ok(())
}
