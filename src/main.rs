// src/main.rs

//! # OCA Resolver - Main Entry Point
//!
//! Synchronizes the local bundle cache with the configured bundle origin and
//! prints the resolved card data for each credential definition id given on
//! the command line.
//!
//! ```text
//! oca-resolver Q6ZyHkUwPGRpJNv1Ut2Axs:3:CL:12345:student_card
//! ```
//!
//! ## Configuration
//! Read from an optional `oca-resolver.{toml,json,yaml}` file and `OCA_*`
//! environment variables (a `.env` file is honoured):
//! - `OCA_BASE_URL`: bundle origin serving `ocabundles.json`
//! - `OCA_CACHE_DIR`: local working directory (default: `oca-cache`)
//! - `OCA_LANGUAGE`: preferred language (default: `en`)
//! - `OCA_BRANDING_REVISION`: `current` or `legacy`
//! - `RUST_LOG`: log verbosity

use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use oca_resolver::{
    Identifiers, OcaBundleResolver, RemoteOcaBundleResolver, ResolverConfig, SyncOutcome,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let config = ResolverConfig::load().context("Failed to load resolver configuration")?;
    info!(
        "Using bundle origin {} with cache at {}",
        config.base_url,
        config.cache_dir.display()
    );

    let remote = Arc::new(
        RemoteOcaBundleResolver::new(&config).context("Failed to initialize bundle resolver")?,
    );
    if let Err(e) = remote.load_local_index().await {
        warn!("Ignoring unreadable local bundle index: {}", e);
    }
    match remote.check_for_updates().await {
        SyncOutcome::Unreachable => warn!("Working offline from the local bundle cache"),
        SyncOutcome::Unchanged(_) => info!("Bundle cache is up to date"),
        SyncOutcome::Updated(report) if !report.is_clean() => {
            warn!("{} bundle cache operations failed", report.failed.len())
        }
        SyncOutcome::Updated(_) => info!("Bundle cache updated"),
    }

    // Consumers only see the resolver seam
    let resolver: Arc<dyn OcaBundleResolver> = remote;
    for credential_definition_id in std::env::args().skip(1) {
        let identifiers = Identifiers::for_credential_definition(credential_definition_id);
        let overlay = resolver
            .resolve_all_bundles(&identifiers, None, None, None)
            .await;
        let rendered = serde_json::to_string_pretty(&overlay)
            .context("Failed to serialize resolved bundle")?;
        println!("{}", rendered);
    }
    Ok(())
}
