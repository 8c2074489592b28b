//! IP address assignment
//!
//! Anycast addresses legitimately exist as several identical records bound
//! to different interfaces; the engine never steals one that is in use.
//! Everything else is treated as unique: at most one record per address,
//! moved to wherever the address currently lives.

use tracing::{debug, info};

use crate::domain::Cidr;
use crate::errors::SyncResult;
use crate::netbox::types::{IpRole, NewIpAddress};
use crate::netbox::NetboxClient;
use crate::report::CategoryReport;

/// Converge one locally configured address onto an interface
pub async fn assign(
    client: &dyn NetboxClient,
    address: &Cidr,
    interface: i64,
    report: &mut CategoryReport,
) -> SyncResult<()> {
    let records = client.ip_addresses(&address.as_cidr()).await?;

    let Some(first) = records.first() else {
        info!(%address, "Creating IP address");
        client
            .create_ip_address(&NewIpAddress {
                address: address.clone(),
                status: "active".to_string(),
                role: None,
                interface: Some(interface),
            })
            .await?;
        report.created += 1;
        return Ok(());
    };

    if first.is_anycast() {
        // Prefer an idle copy; otherwise mint a new record rather than
        // stealing one assigned elsewhere.
        if let Some(free) = records.iter().find(|r| r.assigned_interface.is_none()) {
            info!(%address, "Assigning unused anycast record");
            client.assign_ip_address(free.id, Some(interface)).await?;
            report.updated += 1;
        } else if !records
            .iter()
            .any(|r| r.assigned_interface == Some(interface))
        {
            info!(%address, "All anycast records in use, creating another");
            client
                .create_ip_address(&NewIpAddress {
                    address: address.clone(),
                    status: "active".to_string(),
                    role: Some(IpRole::Anycast),
                    interface: Some(interface),
                })
                .await?;
            report.created += 1;
        } else {
            debug!(%address, "Anycast record already assigned here");
        }
        return Ok(());
    }

    match first.assigned_interface {
        Some(current) if current == interface => {
            debug!(%address, "IP already assigned");
        }
        Some(_) => {
            info!(%address, "IP assigned to another interface, moving it here");
            client.assign_ip_address(first.id, Some(interface)).await?;
            report.updated += 1;
        }
        None => {
            info!(%address, "Assigning existing IP record");
            client.assign_ip_address(first.id, Some(interface)).await?;
            report.updated += 1;
        }
    }

    Ok(())
}
