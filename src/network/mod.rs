//! Network interface reconciliation
//!
//! Converges a device's NetBox interfaces to the locally observed ones.
//! Per interface the pipeline runs in a fixed order: existence, find or
//! create, type classification, VLAN mode, MAC set, link fields, stale LAG
//! clearing, cabling, IP assignment; field changes accumulate in a patch
//! saved once per interface. A second pass wires LAG and bridge
//! parent/slave references, which has to wait until every parent exists
//! remotely.

mod cabling;
mod ip;

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::NicIdentifier;
use crate::domain::MacAddress;
use crate::errors::SyncResult;
use crate::facts::InterfaceFact;
use crate::netbox::types::{Interface, InterfacePatch, InterfaceType, NewInterface, VlanMode};
use crate::netbox::{get_or_create_vlan, NetboxClient};
use crate::report::CategoryReport;

/// Reconciles one device's interfaces against NetBox
pub struct NetworkSync<'a> {
    client: &'a dyn NetboxClient,
    device: i64,
    nic_identifier: NicIdentifier,
    virtual_machine: bool,
}

impl<'a> NetworkSync<'a> {
    pub fn new(
        client: &'a dyn NetboxClient,
        device: i64,
        nic_identifier: NicIdentifier,
        virtual_machine: bool,
    ) -> Self {
        Self {
            client,
            device,
            nic_identifier,
            virtual_machine,
        }
    }

    pub async fn run(&self, interfaces: &[InterfaceFact]) -> SyncResult<CategoryReport> {
        let mut report = CategoryReport::new("network");

        self.prune_departed(interfaces, &mut report).await?;

        for nic in interfaces {
            self.reconcile_interface(nic, interfaces, &mut report)
                .await?;
        }

        // Parents are guaranteed to exist remotely by now
        self.link_members(interfaces, Relation::Lag, &mut report)
            .await?;
        self.link_members(interfaces, Relation::Bridge, &mut report)
            .await?;

        Ok(report)
    }

    /// Identity key of a local interface. Virtual devices (wireguard, tun)
    /// and some bonds have no MAC, so MAC identity falls back to the name
    /// for them; treating them as unmatchable would delete and recreate
    /// them every run.
    fn local_key(&self, nic: &InterfaceFact) -> String {
        match self.nic_identifier {
            NicIdentifier::Name => nic.name.clone(),
            NicIdentifier::Mac => match nic.effective_mac() {
                Some(mac) => mac.as_str(),
                None => {
                    debug!(name = %nic.name, "No MAC to identify by, falling back to name");
                    nic.name.clone()
                }
            },
        }
    }

    fn remote_key(&self, interface: &Interface) -> String {
        match self.nic_identifier {
            NicIdentifier::Name => interface.name.clone(),
            NicIdentifier::Mac => match interface.mac_address {
                Some(mac) => mac.as_str(),
                None => interface.name.clone(),
            },
        }
    }

    /// Step 1: delete remote interfaces that no longer exist locally, then
    /// unassign remote IPs whose address is no longer configured anywhere
    /// on this host. The IP objects themselves are kept.
    async fn prune_departed(
        &self,
        interfaces: &[InterfaceFact],
        report: &mut CategoryReport,
    ) -> SyncResult<()> {
        let remote = self.client.interfaces(self.device).await?;
        let local_keys: HashSet<String> =
            interfaces.iter().map(|n| self.local_key(n)).collect();

        let mut survivors = 0usize;
        for interface in &remote {
            if !local_keys.contains(&self.remote_key(interface)) {
                info!(
                    interface = %interface.name,
                    "Deleting interface not present locally"
                );
                self.client.delete_interface(interface.id).await?;
                report.deleted += 1;
            } else {
                survivors += 1;
            }
        }

        if survivors == 0 {
            return Ok(());
        }

        let local_addresses: HashSet<String> = interfaces
            .iter()
            .flat_map(|n| n.addresses.iter().map(|a| a.as_cidr()))
            .collect();

        for ip in self.client.ip_addresses_for_device(self.device).await? {
            if ip.assigned_interface.is_some() && !local_addresses.contains(&ip.address.as_cidr()) {
                info!(address = %ip.address, "Unassigning IP no longer configured locally");
                self.client.assign_ip_address(ip.id, None).await?;
                report.updated += 1;
            }
        }

        Ok(())
    }

    async fn find(&self, nic: &InterfaceFact) -> SyncResult<Option<Interface>> {
        match (self.nic_identifier, nic.effective_mac()) {
            (NicIdentifier::Mac, Some(mac)) => {
                let all = self.client.interfaces(self.device).await?;
                Ok(all.into_iter().find(|i| i.mac_address == Some(mac)))
            }
            _ => self.client.interface_by_name(self.device, &nic.name).await,
        }
    }

    /// Steps 2-10 for one interface
    async fn reconcile_interface(
        &self,
        nic: &InterfaceFact,
        all_nics: &[InterfaceFact],
        report: &mut CategoryReport,
    ) -> SyncResult<()> {
        let interface = match self.find(nic).await? {
            Some(interface) => interface,
            None => {
                info!(name = %nic.name, "Creating interface");
                let interface = self
                    .client
                    .create_interface(&NewInterface {
                        device: self.device,
                        name: nic.name.clone(),
                        if_type: self.classify(nic),
                        enabled: nic.link_up.unwrap_or(true),
                        mgmt_only: nic.mgmt_only,
                        mac_address: nic.effective_mac(),
                        mtu: nic.mtu,
                    })
                    .await?;
                report.created += 1;
                interface
            }
        };

        let mut patch = InterfacePatch::default();

        // Step 3: type classification
        let expected_type = self.classify(nic);
        if interface.if_type != Some(expected_type) {
            info!(name = %nic.name, ?expected_type, "Interface type is wrong, resetting");
            patch.if_type = Some(expected_type);
        }

        // Step 4: VLAN mode
        self.reconcile_vlan(nic, &interface, &mut patch).await?;

        // Name drift: only observable when identity is the MAC
        if nic.name != interface.name {
            info!(old = %interface.name, new = %nic.name, "Updating interface name");
            patch.name = Some(nic.name.clone());
        }

        // Step 5: MAC set
        if let Some(mac) = nic.effective_mac() {
            self.reconcile_macs(&interface, mac, &mut patch, report)
                .await?;
        }

        // Step 6: MTU, duplex, speed
        if let Some(mtu) = nic.mtu {
            if interface.mtu != Some(mtu) {
                info!(name = %nic.name, %mtu, "Interface MTU is wrong, updating");
                patch.mtu = Some(mtu);
            }
        }
        if !self.virtual_machine {
            if let Some(duplex) = nic.duplex {
                if interface.duplex != Some(duplex) {
                    patch.duplex = Some(duplex);
                }
            }
            if let Some(speed) = nic.speed_kbps {
                if interface.speed_kbps != Some(speed) {
                    patch.speed_kbps = Some(speed);
                }
            }
        }

        // Step 7: clear a LAG reference its parent no longer claims
        if let Some(lag) = &interface.lag {
            let still_slave = all_nics
                .iter()
                .find(|n| n.name == lag.name)
                .is_some_and(|parent| parent.bonding_slaves.contains(&nic.name));
            if !still_slave {
                info!(name = %nic.name, lag = %lag.name, "Interface left its LAG, clearing");
                patch.lag = Some(None);
            }
        }

        // Step 8: cabling, physical hosts with LLDP data only
        if !self.virtual_machine {
            if let Some(lldp) = &nic.lldp {
                cabling::reconcile(self.client, &interface, lldp, report).await?;
            }
        }

        // Step 9: IP assignment
        for address in &nic.addresses {
            ip::assign(self.client, address, interface.id, report).await?;
        }

        // Step 10: one batched save per interface
        if !patch.is_empty() {
            self.client.update_interface(interface.id, &patch).await?;
            report.updated += 1;
        } else {
            debug!(name = %nic.name, "Interface already in sync");
        }

        Ok(())
    }

    /// Step 4: exactly one of three reconciled states: no mode, tagged
    /// with the single local VLAN, or access with the LLDP PVID.
    async fn reconcile_vlan(
        &self,
        nic: &InterfaceFact,
        interface: &Interface,
        patch: &mut InterfacePatch,
    ) -> SyncResult<()> {
        let lldp_pvid = nic.lldp.as_ref().and_then(|l| l.pvid);

        match (nic.vlan, lldp_pvid) {
            (None, None) => {
                if interface.mode.is_some() || !interface.tagged_vlans.is_empty() {
                    info!(name = %nic.name, "Interface is not tagged, resetting mode");
                    patch.mode = Some(None);
                    patch.tagged_vlans = Some(Vec::new());
                    patch.untagged_vlan = Some(None);
                }
            }
            (Some(vlan), _) => {
                let in_sync = interface.mode == Some(VlanMode::Tagged)
                    && interface.tagged_vlans.len() == 1
                    && interface.tagged_vlans[0].vid == vlan
                    && interface.untagged_vlan.is_none();
                if !in_sync {
                    info!(name = %nic.name, vid = vlan.value(), "Resetting tagged VLAN");
                    let nb_vlan = get_or_create_vlan(self.client, vlan).await?;
                    patch.mode = Some(Some(VlanMode::Tagged));
                    patch.tagged_vlans = Some(vec![nb_vlan.id]);
                    patch.untagged_vlan = Some(None);
                }
            }
            (None, Some(pvid)) => {
                let in_sync = interface.mode == Some(VlanMode::Access)
                    && interface.tagged_vlans.is_empty()
                    && interface.untagged_vlan.as_ref().map(|v| v.vid) == Some(pvid);
                if !in_sync {
                    info!(name = %nic.name, vid = pvid.value(), "Resetting access VLAN");
                    let nb_vlan = get_or_create_vlan(self.client, pvid).await?;
                    patch.mode = Some(Some(VlanMode::Access));
                    patch.tagged_vlans = Some(Vec::new());
                    patch.untagged_vlan = Some(Some(nb_vlan.id));
                }
            }
        }

        Ok(())
    }

    /// Step 5: the remote MAC-object set must equal {current local MAC};
    /// the primary MAC follows.
    async fn reconcile_macs(
        &self,
        interface: &Interface,
        mac: MacAddress,
        patch: &mut InterfacePatch,
        report: &mut CategoryReport,
    ) -> SyncResult<()> {
        let remote_macs = self.client.interface_macs(interface.id).await?;

        for stale in remote_macs.iter().filter(|m| m.mac_address != mac) {
            debug!(interface = %interface.name, mac = %stale.mac_address, "Deleting extra MAC");
            self.client.delete_mac(stale.id).await?;
            report.deleted += 1;
        }

        let mac_object_id = match remote_macs.iter().find(|m| m.mac_address == mac) {
            Some(existing) => existing.id,
            None => {
                debug!(interface = %interface.name, %mac, "Adding MAC");
                let created = self.client.create_interface_mac(interface.id, &mac).await?;
                report.created += 1;
                created.id
            }
        };

        if interface.mac_address != Some(mac) {
            info!(interface = %interface.name, %mac, "Updating primary MAC");
            patch.primary_mac = Some(mac_object_id);
        }

        Ok(())
    }

    fn classify(&self, nic: &InterfaceFact) -> InterfaceType {
        classify(self.virtual_machine, nic)
    }

    /// Step 11: point slaves at their parent once every parent exists
    async fn link_members(
        &self,
        interfaces: &[InterfaceFact],
        relation: Relation,
        report: &mut CategoryReport,
    ) -> SyncResult<()> {
        let parents = interfaces.iter().filter(|n| match relation {
            Relation::Lag => n.bonding,
            Relation::Bridge => n.bridge,
        });

        for parent in parents {
            let Some(parent_if) = self.find(parent).await? else {
                continue;
            };
            let slave_names = match relation {
                Relation::Lag => &parent.bonding_slaves,
                Relation::Bridge => &parent.bridge_slaves,
            };

            for slave_name in slave_names {
                let Some(slave_nic) = interfaces.iter().find(|n| &n.name == slave_name) else {
                    continue;
                };
                let Some(slave_if) = self.find(slave_nic).await? else {
                    continue;
                };

                let current = match relation {
                    Relation::Lag => slave_if.lag.as_ref().map(|r| r.id),
                    Relation::Bridge => slave_if.bridge.as_ref().map(|r| r.id),
                };
                if current == Some(parent_if.id) {
                    continue;
                }

                info!(
                    slave = %slave_if.name,
                    parent = %parent_if.name,
                    ?relation,
                    "Linking member to parent"
                );
                let mut patch = InterfacePatch::default();
                match relation {
                    Relation::Lag => patch.lag = Some(Some(parent_if.id)),
                    Relation::Bridge => patch.bridge = Some(Some(parent_if.id)),
                }
                self.client.update_interface(slave_if.id, &patch).await?;
                report.updated += 1;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Relation {
    Lag,
    Bridge,
}

/// Priority classification: VM context, bond, bridge and virtual devices
/// first, then the speed/medium table, then Other.
fn classify(virtual_machine: bool, nic: &InterfaceFact) -> InterfaceType {
    if virtual_machine {
        return InterfaceType::Virtual;
    }
    if nic.bonding {
        return InterfaceType::Lag;
    }
    if nic.bridge {
        return InterfaceType::Bridge;
    }
    if nic.virtual_device {
        return InterfaceType::Virtual;
    }

    let Some(speed) = nic.classification_speed() else {
        return InterfaceType::Other;
    };
    let modular = nic.port_medium.is_some_and(|p| p.is_modular());

    match speed {
        10_000_000 => {
            if modular {
                InterfaceType::SfpPlus
            } else {
                InterfaceType::TenGigBaseT
            }
        }
        25_000_000 if modular => InterfaceType::Sfp28,
        5_000_000 => InterfaceType::FiveGigBaseT,
        2_500_000 => InterfaceType::TwoAndHalfGigBaseT,
        1_000_000 => {
            if modular {
                InterfaceType::Sfp
            } else {
                InterfaceType::GigBaseT
            }
        }
        _ => InterfaceType::Other,
    }
}
