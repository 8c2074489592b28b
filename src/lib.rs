//! NetBox inventory reconciliation engine
//!
//! Takes a normalized snapshot of one host's hardware and network facts and
//! converges the corresponding NetBox records toward it: module bays and
//! modules for hardware, interfaces with their VLANs, MACs, cables and IPs
//! for the network side. Runs are idempotent; a repeat run over unchanged
//! facts performs zero writes.

pub mod config;
pub mod domain;
pub mod errors;
pub mod facts;
pub mod inventory;
pub mod netbox;
pub mod network;
pub mod report;

// Re-export commonly used types
pub use config::{NetboxConfig, NicIdentifier, SyncConfig};
pub use errors::{SyncError, SyncResult};
pub use facts::HostFacts;
pub use report::{CategoryReport, RunReport};

use tracing::{debug, info};

use inventory::InventorySync;
use netbox::NetboxClient;
use network::NetworkSync;

/// One full reconciliation run: hardware categories first, then the
/// network pipeline. Hardware is skipped for virtual machines, which have
/// no module bays.
pub async fn run_sync(
    client: &dyn NetboxClient,
    config: &SyncConfig,
    facts: &HostFacts,
) -> SyncResult<RunReport> {
    let device = client
        .device_by_name(&config.device)
        .await?
        .ok_or_else(|| SyncError::DeviceNotFound(config.device.clone()))?;

    info!(device = %config.device, device_id = device.id, "Starting reconciliation run");

    let mut report = RunReport::new();

    if facts.virtual_machine {
        debug!("Virtual machine, skipping hardware inventory");
    } else {
        let inventory = InventorySync::new(client, device.id);
        for category in inventory.run(&facts.hardware).await? {
            report.push(category);
        }
    }

    let network = NetworkSync::new(
        client,
        device.id,
        config.nic_identifier,
        facts.virtual_machine,
    );
    report.push(network.run(&facts.interfaces).await?);

    info!(writes = report.total_writes(), "Run complete");
    Ok(report)
}
