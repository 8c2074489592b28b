//! In-memory NetBox double for integration tests
//!
//! Holds the whole remote state behind a mutex and counts every write, so
//! tests can assert both the converged state and the idempotence property
//! (a repeat run performs zero writes).

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use netbox_sync::domain::{Cidr, MacAddress, VlanId};
use netbox_sync::errors::SyncResult;
use netbox_sync::netbox::types::{
    CableRef, CableTermination, Device, Interface, InterfacePatch, InterfaceType, IpAddress,
    IpRole, MacAddressObject, Module, ModuleBay, ModuleType, NamedRef, NewInterface, NewIpAddress,
    NewModule, NewModuleBay, Vlan, VlanMode, VlanRef,
};
use netbox_sync::netbox::NetboxClient;

struct Cable {
    id: i64,
    a: i64,
    b: i64,
}

struct BayRecord {
    device: i64,
    bay: ModuleBay,
    position: Option<String>,
    description: Option<String>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    devices: Vec<Device>,
    bays: Vec<BayRecord>,
    modules: Vec<(i64, Module)>,
    module_types: Vec<ModuleType>,
    interfaces: Vec<Interface>,
    macs: Vec<(i64, MacAddressObject)>,
    vlans: Vec<Vlan>,
    ips: Vec<IpAddress>,
    cables: Vec<Cable>,
    writes: u32,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn cable_for(&self, interface: i64) -> Option<CableRef> {
        let cable = self
            .cables
            .iter()
            .find(|c| c.a == interface || c.b == interface)?;
        let far_id = if cable.a == interface {
            cable.b
        } else {
            cable.a
        };
        let far_end = self
            .interfaces
            .iter()
            .filter(|i| i.id == far_id)
            .map(|i| CableTermination {
                interface_id: i.id,
                interface_name: i.name.clone(),
                device_id: i.device,
            })
            .collect();
        Some(CableRef {
            id: cable.id,
            far_end,
        })
    }

    fn view_interface(&self, interface: &Interface) -> Interface {
        let mut out = interface.clone();
        out.cable = self.cable_for(interface.id);
        out
    }

    fn view_ip(&self, ip: &IpAddress) -> IpAddress {
        let mut out = ip.clone();
        out.assigned_device = ip.assigned_interface.and_then(|iface| {
            self.interfaces
                .iter()
                .find(|i| i.id == iface)
                .map(|i| i.device)
        });
        out
    }
}

/// The double itself: seed it, run the engine against it, inspect it
#[derive(Default)]
pub struct MockNetbox {
    state: Mutex<State>,
}

impl MockNetbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // --- seeding -----------------------------------------------------

    pub fn add_device(&self, name: &str) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.devices.push(Device {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_module_bay(&self, device: i64, name: &str) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.bays.push(BayRecord {
            device,
            bay: ModuleBay {
                id,
                name: name.to_string(),
            },
            position: None,
            description: None,
        });
        id
    }

    pub fn add_module_type(
        &self,
        part_number: Option<&str>,
        model: Option<&str>,
        profile: &str,
    ) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.module_types.push(ModuleType {
            id,
            model: model.map(str::to_string),
            part_number: part_number.map(str::to_string),
            profile: Some(profile.to_string()),
        });
        id
    }

    pub fn add_module(
        &self,
        device: i64,
        bay_name: &str,
        module_type: i64,
        serial: Option<&str>,
    ) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        let bay = s
            .bays
            .iter()
            .find(|r| r.device == device && r.bay.name == bay_name)
            .map(|r| NamedRef {
                id: r.bay.id,
                name: r.bay.name.clone(),
            });
        let type_record = s.module_types.iter().find(|t| t.id == module_type).cloned();
        s.modules.push((
            device,
            Module {
                id,
                module_bay: bay,
                module_type: type_record,
                serial: serial.map(str::to_string),
            },
        ));
        id
    }

    pub fn add_interface(&self, device: i64, name: &str, if_type: InterfaceType) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.interfaces.push(Interface {
            id,
            device,
            name: name.to_string(),
            if_type: Some(if_type),
            enabled: true,
            mtu: None,
            mac_address: None,
            mode: None,
            tagged_vlans: Vec::new(),
            untagged_vlan: None,
            lag: None,
            bridge: None,
            cable: None,
            duplex: None,
            speed_kbps: None,
            mgmt_only: false,
        });
        id
    }

    pub fn set_interface_mac(&self, interface: i64, mac: MacAddress) {
        let mut s = self.lock();
        let id = s.next_id();
        s.macs.push((
            interface,
            MacAddressObject {
                id,
                mac_address: mac,
            },
        ));
        if let Some(i) = s.interfaces.iter_mut().find(|i| i.id == interface) {
            i.mac_address = Some(mac);
        }
    }

    pub fn set_tagged_vlan(&self, interface: i64, vlan: i64) {
        let mut s = self.lock();
        let vlan_ref = s
            .vlans
            .iter()
            .find(|v| v.id == vlan)
            .map(|v| VlanRef { id: v.id, vid: v.vid });
        if let (Some(i), Some(v)) = (s.interfaces.iter_mut().find(|i| i.id == interface), vlan_ref)
        {
            i.mode = Some(VlanMode::Tagged);
            i.tagged_vlans = vec![v];
        }
    }

    pub fn set_lag(&self, interface: i64, parent: i64) {
        let mut s = self.lock();
        let parent_ref = s
            .interfaces
            .iter()
            .find(|i| i.id == parent)
            .map(|i| NamedRef {
                id: i.id,
                name: i.name.clone(),
            });
        if let (Some(i), Some(parent_ref)) = (
            s.interfaces.iter_mut().find(|i| i.id == interface),
            parent_ref,
        ) {
            i.lag = Some(parent_ref);
        }
    }

    pub fn add_cable(&self, a: i64, b: i64) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.cables.push(Cable { id, a, b });
        id
    }

    pub fn set_mgmt_only(&self, interface: i64) {
        let mut s = self.lock();
        if let Some(i) = s.interfaces.iter_mut().find(|i| i.id == interface) {
            i.mgmt_only = true;
        }
    }

    pub fn add_vlan(&self, vid: u16, name: &str) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        let vid = VlanId::new(vid).unwrap();
        s.vlans.push(Vlan {
            id,
            vid,
            name: name.to_string(),
        });
        id
    }

    pub fn add_ip(&self, address: &str, role: Option<IpRole>, interface: Option<i64>) -> i64 {
        let mut s = self.lock();
        let id = s.next_id();
        s.ips.push(IpAddress {
            id,
            address: Cidr::new(address).unwrap(),
            role,
            assigned_interface: interface,
            assigned_device: None,
        });
        id
    }

    // --- inspection --------------------------------------------------

    pub fn writes(&self) -> u32 {
        self.lock().writes
    }

    pub fn bays_of(&self, device: i64) -> Vec<ModuleBay> {
        self.lock()
            .bays
            .iter()
            .filter(|r| r.device == device)
            .map(|r| r.bay.clone())
            .collect()
    }

    /// Position and description a bay was created with
    pub fn bay_detail(&self, device: i64, name: &str) -> Option<(Option<String>, Option<String>)> {
        self.lock()
            .bays
            .iter()
            .find(|r| r.device == device && r.bay.name == name)
            .map(|r| (r.position.clone(), r.description.clone()))
    }

    pub fn modules_of(&self, device: i64) -> Vec<Module> {
        self.lock()
            .modules
            .iter()
            .filter(|(d, _)| *d == device)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn interfaces_of(&self, device: i64) -> Vec<Interface> {
        let s = self.lock();
        s.interfaces
            .iter()
            .filter(|i| i.device == device)
            .map(|i| s.view_interface(i))
            .collect()
    }

    pub fn interface_named(&self, device: i64, name: &str) -> Option<Interface> {
        let s = self.lock();
        s.interfaces
            .iter()
            .find(|i| i.device == device && i.name == name)
            .map(|i| s.view_interface(i))
    }

    pub fn ips_matching(&self, address: &str) -> Vec<IpAddress> {
        let s = self.lock();
        s.ips
            .iter()
            .filter(|ip| ip.address.as_cidr() == address)
            .map(|ip| s.view_ip(ip))
            .collect()
    }

    pub fn vlan_count(&self) -> usize {
        self.lock().vlans.len()
    }

    pub fn cable_count(&self) -> usize {
        self.lock().cables.len()
    }
}

#[async_trait]
impl NetboxClient for MockNetbox {
    async fn device_by_name(&self, name: &str) -> SyncResult<Option<Device>> {
        Ok(self.lock().devices.iter().find(|d| d.name == name).cloned())
    }

    async fn module_bays(&self, device: i64) -> SyncResult<Vec<ModuleBay>> {
        Ok(self.bays_of(device))
    }

    async fn create_module_bay(&self, new: &NewModuleBay) -> SyncResult<ModuleBay> {
        let mut s = self.lock();
        let id = s.next_id();
        let bay = ModuleBay {
            id,
            name: new.name.clone(),
        };
        s.bays.push(BayRecord {
            device: new.device,
            bay: bay.clone(),
            position: new.position.clone(),
            description: new.description.clone(),
        });
        s.writes += 1;
        Ok(bay)
    }

    async fn modules(&self, device: i64) -> SyncResult<Vec<Module>> {
        Ok(self.modules_of(device))
    }

    async fn create_module(&self, new: &NewModule) -> SyncResult<Module> {
        let mut s = self.lock();
        let id = s.next_id();
        let bay = s
            .bays
            .iter()
            .find(|r| r.bay.id == new.module_bay)
            .map(|r| NamedRef {
                id: r.bay.id,
                name: r.bay.name.clone(),
            });
        let type_record = s
            .module_types
            .iter()
            .find(|t| t.id == new.module_type)
            .cloned();
        let module = Module {
            id,
            module_bay: bay,
            module_type: type_record,
            serial: new.serial.clone(),
        };
        s.modules.push((new.device, module.clone()));
        s.writes += 1;
        Ok(module)
    }

    async fn delete_module(&self, id: i64) -> SyncResult<()> {
        let mut s = self.lock();
        s.modules.retain(|(_, m)| m.id != id);
        s.writes += 1;
        Ok(())
    }

    async fn module_type(
        &self,
        part_number: Option<&str>,
        model: Option<&str>,
    ) -> SyncResult<Option<ModuleType>> {
        let s = self.lock();
        Ok(s.module_types
            .iter()
            .find(|t| {
                let pn_ok =
                    part_number.is_none() || t.part_number.as_deref() == part_number;
                let model_ok = model.is_none() || t.model.as_deref() == model;
                pn_ok && model_ok
            })
            .cloned())
    }

    async fn interfaces(&self, device: i64) -> SyncResult<Vec<Interface>> {
        Ok(self.interfaces_of(device))
    }

    async fn interface_by_name(&self, device: i64, name: &str) -> SyncResult<Option<Interface>> {
        Ok(self.interface_named(device, name))
    }

    async fn management_interface(&self, device: i64) -> SyncResult<Option<Interface>> {
        let s = self.lock();
        Ok(s.interfaces
            .iter()
            .find(|i| i.device == device && i.mgmt_only)
            .map(|i| s.view_interface(i)))
    }

    async fn create_interface(&self, new: &NewInterface) -> SyncResult<Interface> {
        let mut s = self.lock();
        let id = s.next_id();
        let interface = Interface {
            id,
            device: new.device,
            name: new.name.clone(),
            if_type: Some(new.if_type),
            enabled: new.enabled,
            mtu: new.mtu,
            mac_address: new.mac_address,
            mode: None,
            tagged_vlans: Vec::new(),
            untagged_vlan: None,
            lag: None,
            bridge: None,
            cable: None,
            duplex: None,
            speed_kbps: None,
            mgmt_only: new.mgmt_only,
        };
        s.interfaces.push(interface.clone());
        // NetBox materializes a MAC object for a create-time mac_address
        if let Some(mac) = new.mac_address {
            let mac_id = s.next_id();
            s.macs.push((
                id,
                MacAddressObject {
                    id: mac_id,
                    mac_address: mac,
                },
            ));
        }
        s.writes += 1;
        Ok(interface)
    }

    async fn update_interface(&self, id: i64, patch: &InterfacePatch) -> SyncResult<Interface> {
        let mut s = self.lock();

        let tagged: Option<Vec<VlanRef>> = patch.tagged_vlans.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|vid| {
                    s.vlans
                        .iter()
                        .find(|v| v.id == *vid)
                        .map(|v| VlanRef { id: v.id, vid: v.vid })
                })
                .collect()
        });
        let untagged: Option<Option<VlanRef>> = patch.untagged_vlan.map(|inner| {
            inner.and_then(|vid| {
                s.vlans
                    .iter()
                    .find(|v| v.id == vid)
                    .map(|v| VlanRef { id: v.id, vid: v.vid })
            })
        });
        let lag: Option<Option<NamedRef>> = patch.lag.map(|inner| {
            inner.and_then(|iface| {
                s.interfaces.iter().find(|i| i.id == iface).map(|i| NamedRef {
                    id: i.id,
                    name: i.name.clone(),
                })
            })
        });
        let bridge: Option<Option<NamedRef>> = patch.bridge.map(|inner| {
            inner.and_then(|iface| {
                s.interfaces.iter().find(|i| i.id == iface).map(|i| NamedRef {
                    id: i.id,
                    name: i.name.clone(),
                })
            })
        });
        let primary_mac = patch.primary_mac.and_then(|mac_id| {
            s.macs
                .iter()
                .find(|(_, m)| m.id == mac_id)
                .map(|(_, m)| m.mac_address)
        });

        let Some(interface) = s.interfaces.iter_mut().find(|i| i.id == id) else {
            return Ok(Interface {
                id,
                device: 0,
                name: String::new(),
                if_type: None,
                enabled: false,
                mtu: None,
                mac_address: None,
                mode: None,
                tagged_vlans: Vec::new(),
                untagged_vlan: None,
                lag: None,
                bridge: None,
                cable: None,
                duplex: None,
                speed_kbps: None,
                mgmt_only: false,
            });
        };

        if let Some(name) = &patch.name {
            interface.name = name.clone();
        }
        if let Some(if_type) = patch.if_type {
            interface.if_type = Some(if_type);
        }
        if let Some(mode) = patch.mode {
            interface.mode = mode;
        }
        if let Some(tagged) = tagged {
            interface.tagged_vlans = tagged;
        }
        if let Some(untagged) = untagged {
            interface.untagged_vlan = untagged;
        }
        if let Some(lag) = lag {
            interface.lag = lag;
        }
        if let Some(bridge) = bridge {
            interface.bridge = bridge;
        }
        if let Some(mtu) = patch.mtu {
            interface.mtu = Some(mtu);
        }
        if let Some(mac) = primary_mac {
            interface.mac_address = Some(mac);
        }
        if let Some(duplex) = patch.duplex {
            interface.duplex = Some(duplex);
        }
        if let Some(speed) = patch.speed_kbps {
            interface.speed_kbps = Some(speed);
        }

        let updated = interface.clone();
        s.writes += 1;
        let view = s.view_interface(&updated);
        Ok(view)
    }

    async fn delete_interface(&self, id: i64) -> SyncResult<()> {
        let mut s = self.lock();
        s.interfaces.retain(|i| i.id != id);
        s.macs.retain(|(iface, _)| *iface != id);
        s.cables.retain(|c| c.a != id && c.b != id);
        for ip in s.ips.iter_mut() {
            if ip.assigned_interface == Some(id) {
                ip.assigned_interface = None;
            }
        }
        s.writes += 1;
        Ok(())
    }

    async fn interface_macs(&self, interface: i64) -> SyncResult<Vec<MacAddressObject>> {
        Ok(self
            .lock()
            .macs
            .iter()
            .filter(|(iface, _)| *iface == interface)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn create_interface_mac(
        &self,
        interface: i64,
        mac: &MacAddress,
    ) -> SyncResult<MacAddressObject> {
        let mut s = self.lock();
        let id = s.next_id();
        let record = MacAddressObject {
            id,
            mac_address: *mac,
        };
        s.macs.push((interface, record.clone()));
        s.writes += 1;
        Ok(record)
    }

    async fn delete_mac(&self, id: i64) -> SyncResult<()> {
        let mut s = self.lock();
        s.macs.retain(|(_, m)| m.id != id);
        s.writes += 1;
        Ok(())
    }

    async fn vlan_by_vid(&self, vid: VlanId) -> SyncResult<Option<Vlan>> {
        Ok(self.lock().vlans.iter().find(|v| v.vid == vid).cloned())
    }

    async fn create_vlan(&self, vid: VlanId, name: &str) -> SyncResult<Vlan> {
        let mut s = self.lock();
        let id = s.next_id();
        let vlan = Vlan {
            id,
            vid,
            name: name.to_string(),
        };
        s.vlans.push(vlan.clone());
        s.writes += 1;
        Ok(vlan)
    }

    async fn ip_addresses(&self, address: &str) -> SyncResult<Vec<IpAddress>> {
        let s = self.lock();
        let matches: Vec<IpAddress> = s
            .ips
            .iter()
            .filter(|ip| {
                if address.contains('/') {
                    ip.address.as_cidr() == address
                } else {
                    ip.address.address().to_string() == address
                }
            })
            .map(|ip| s.view_ip(ip))
            .collect();
        Ok(matches)
    }

    async fn ip_addresses_for_device(&self, device: i64) -> SyncResult<Vec<IpAddress>> {
        let s = self.lock();
        let interface_ids: Vec<i64> = s
            .interfaces
            .iter()
            .filter(|i| i.device == device)
            .map(|i| i.id)
            .collect();
        Ok(s.ips
            .iter()
            .filter(|ip| {
                ip.assigned_interface
                    .map_or(false, |iface| interface_ids.contains(&iface))
            })
            .map(|ip| s.view_ip(ip))
            .collect())
    }

    async fn ip_for_interface(&self, interface: i64) -> SyncResult<Option<IpAddress>> {
        let s = self.lock();
        Ok(s.ips
            .iter()
            .find(|ip| ip.assigned_interface == Some(interface))
            .map(|ip| s.view_ip(ip)))
    }

    async fn create_ip_address(&self, new: &NewIpAddress) -> SyncResult<IpAddress> {
        let mut s = self.lock();
        let id = s.next_id();
        let ip = IpAddress {
            id,
            address: new.address.clone(),
            role: new.role,
            assigned_interface: new.interface,
            assigned_device: None,
        };
        s.ips.push(ip.clone());
        s.writes += 1;
        Ok(ip)
    }

    async fn assign_ip_address(&self, id: i64, interface: Option<i64>) -> SyncResult<IpAddress> {
        let mut s = self.lock();
        if let Some(ip) = s.ips.iter_mut().find(|ip| ip.id == id) {
            ip.assigned_interface = interface;
        }
        s.writes += 1;
        let view = s
            .ips
            .iter()
            .find(|ip| ip.id == id)
            .map(|ip| s.view_ip(ip));
        view.ok_or_else(|| {
            netbox_sync::SyncError::Configuration(format!("no such IP record: {id}"))
        })
    }

    async fn create_cable(&self, a_interface: i64, b_interface: i64) -> SyncResult<CableRef> {
        let mut s = self.lock();
        let id = s.next_id();
        s.cables.push(Cable {
            id,
            a: a_interface,
            b: b_interface,
        });
        s.writes += 1;
        Ok(s.cable_for(a_interface).unwrap_or(CableRef {
            id,
            far_end: Vec::new(),
        }))
    }

    async fn delete_cable(&self, id: i64) -> SyncResult<()> {
        let mut s = self.lock();
        s.cables.retain(|c| c.id != id);
        s.writes += 1;
        Ok(())
    }
}
