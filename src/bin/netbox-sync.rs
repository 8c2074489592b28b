//! NetBox sync agent CLI
//!
//! Reads a host facts document (JSON) produced by the collector and
//! converges the NetBox records for the device named in `NETBOX_DEVICE`.
//!
//! Run with: netbox-sync /path/to/facts.json
//!
//! Prerequisites:
//! 1. NetBox API accessible (via NETBOX_URL environment variable)
//! 2. NetBox API token set (via NETBOX_API_TOKEN environment variable)

use anyhow::{Context, Result};
use netbox_sync::netbox::http::NetboxHttp;
use netbox_sync::{run_sync, HostFacts, NetboxConfig, SyncConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting NetBox sync agent");

    let facts_path = std::env::args()
        .nth(1)
        .context("Usage: netbox-sync <facts.json>")?;

    let netbox_config = NetboxConfig::from_env().context("Failed to load NetBox configuration")?;
    let sync_config = SyncConfig::from_env().context("Failed to load sync configuration")?;
    info!("📋 Configuration loaded:");
    info!("  - NetBox URL: {}", netbox_config.base_url);
    info!("  - Device: {}", sync_config.device);

    let raw = std::fs::read_to_string(&facts_path)
        .with_context(|| format!("Failed to read facts file: {facts_path}"))?;
    let facts: HostFacts =
        serde_json::from_str(&raw).context("Failed to parse facts document")?;
    info!(
        hostname = %facts.hostname,
        interfaces = facts.interfaces.len(),
        "Facts loaded"
    );

    let client = NetboxHttp::new(&netbox_config).context("Failed to build NetBox client")?;

    let report = run_sync(&client, &sync_config, &facts)
        .await
        .context("Reconciliation run failed")?;

    for category in report.aborted_categories() {
        warn!(category = %category.category, "Category aborted before completion");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("✅ Run complete: {} writes", report.total_writes());

    Ok(())
}
