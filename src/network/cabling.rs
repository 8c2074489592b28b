//! Cable convergence from LLDP neighbor data
//!
//! The goal state is one cable from the local interface to the switch port
//! LLDP reported, with the switch resolved through its management IP.
//! Cables are immutable: a wrong one is deleted and a correct one created.

use tracing::{error, info, warn};

use crate::domain::Cidr;
use crate::errors::SyncResult;
use crate::facts::LldpNeighbor;
use crate::netbox::types::Interface;
use crate::netbox::NetboxClient;
use crate::report::CategoryReport;

/// Converge the cable on one interface toward its LLDP neighbor.
///
/// Every resolution failure (unknown switch IP, unknown port, switch
/// without a management address) is logged and skipped; only transport
/// errors propagate.
pub async fn reconcile(
    client: &dyn NetboxClient,
    interface: &Interface,
    lldp: &LldpNeighbor,
    report: &mut CategoryReport,
) -> SyncResult<()> {
    let (Some(switch_ip), Some(switch_port)) = (lldp.mgmt_ip.as_deref(), lldp.port.as_deref())
    else {
        return Ok(());
    };

    match &interface.cable {
        None => connect(client, interface, switch_ip, switch_port, report).await,
        Some(cable) => {
            if cable.far_end.len() != 1 {
                warn!(
                    interface = %interface.name,
                    cable = cable.id,
                    terminations = cable.far_end.len(),
                    "Cable does not have exactly one far-end termination, leaving it alone"
                );
                return Ok(());
            }
            let peer = &cable.far_end[0];

            // Re-derive the peer's management IP to compare against LLDP
            let Some(mgmt_if) = client.management_interface(peer.device_id).await? else {
                error!(
                    interface = %interface.name,
                    peer_device = peer.device_id,
                    "Connected device has no management interface, skipping cable check"
                );
                report.skipped += 1;
                return Ok(());
            };
            let Some(mgmt_ip) = client.ip_for_interface(mgmt_if.id).await? else {
                error!(
                    interface = %interface.name,
                    peer_device = peer.device_id,
                    "Connected device has no IP on its management interface, skipping cable check"
                );
                report.skipped += 1;
                return Ok(());
            };

            // LLDP carries a bare address, NetBox a CIDR; compare addresses
            let Ok(reported) = Cidr::new(switch_ip) else {
                error!(
                    interface = %interface.name,
                    ip = switch_ip,
                    "LLDP management IP does not parse, skipping cable check"
                );
                report.skipped += 1;
                return Ok(());
            };
            let ip_matches = mgmt_ip.address.same_address(&reported);
            let port_matches = peer.interface_name == switch_port;
            if ip_matches && port_matches {
                return Ok(());
            }

            info!(
                interface = %interface.name,
                expected_ip = switch_ip,
                expected_port = switch_port,
                "Cable connected to the wrong peer, replacing"
            );
            client.delete_cable(cable.id).await?;
            report.deleted += 1;
            connect(client, interface, switch_ip, switch_port, report).await
        }
    }
}

/// Resolve the switch by management IP, then its port by name, and cable up
async fn connect(
    client: &dyn NetboxClient,
    interface: &Interface,
    switch_ip: &str,
    switch_port: &str,
    report: &mut CategoryReport,
) -> SyncResult<()> {
    let candidates = client.ip_addresses(switch_ip).await?;
    let Some(mgmt) = candidates.first() else {
        error!(ip = switch_ip, "Switch management IP not found, skipping cable");
        report.skipped += 1;
        return Ok(());
    };
    let Some(switch_device) = mgmt.assigned_device else {
        error!(
            ip = switch_ip,
            "Switch management IP is not bound to a device, skipping cable"
        );
        report.skipped += 1;
        return Ok(());
    };
    let Some(switch_if) = client.interface_by_name(switch_device, switch_port).await? else {
        error!(
            device = switch_device,
            port = switch_port,
            "Switch port not found, skipping cable"
        );
        report.skipped += 1;
        return Ok(());
    };

    info!(
        interface = %interface.name,
        ip = switch_ip,
        port = switch_port,
        "Connecting interface to switch port"
    );
    client.create_cable(interface.id, switch_if.id).await?;
    report.created += 1;
    Ok(())
}
