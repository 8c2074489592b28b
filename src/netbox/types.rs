//! NetBox record types as the engine sees them
//!
//! Every remote entity is an explicit record with `Option` fields for
//! anything NetBox may omit; reconciliation code tests field presence on
//! these records instead of probing the raw API payloads. The HTTP layer is
//! responsible for flattening NetBox's nested `{value, label}` choice
//! wrappers into the enums below.

use serde::{Deserialize, Serialize};

use crate::domain::{Cidr, Duplex, MacAddress, Mtu, VlanId};

/// A device record (this host, or a discovered switch)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
}

/// Minimal id+name reference NetBox nests inside other objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// A module bay: a named slot holding at most one module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleBay {
    pub id: i64,
    pub name: String,
}

/// Fields for creating a module bay
#[derive(Debug, Clone, Serialize)]
pub struct NewModuleBay {
    pub device: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A module-type catalog entry, keyed by part number and/or model.
///
/// The engine only ever resolves these; creating catalog entries is an
/// operator task and a lookup miss is a reportable skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleType {
    pub id: i64,
    pub model: Option<String>,
    pub part_number: Option<String>,
    /// Profile name classifying the type ("CPU", "Memory", ...); drives
    /// per-category module filtering
    pub profile: Option<String>,
}

/// A module occupying a bay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub module_bay: Option<NamedRef>,
    pub module_type: Option<ModuleType>,
    pub serial: Option<String>,
}

/// Fields for creating a module
#[derive(Debug, Clone, Serialize)]
pub struct NewModule {
    pub device: i64,
    pub module_bay: i64,
    pub module_type: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

/// VLAN record, keyed by numeric id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vlan {
    pub id: i64,
    pub vid: VlanId,
    pub name: String,
}

/// VLAN reference nested inside an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRef {
    pub id: i64,
    pub vid: VlanId,
}

/// 802.1Q mode on an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VlanMode {
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "tagged")]
    Tagged,
    #[serde(rename = "tagged-all")]
    TaggedAll,
}

/// NetBox interface type slugs the engine assigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceType {
    #[serde(rename = "virtual")]
    Virtual,
    #[serde(rename = "lag")]
    Lag,
    #[serde(rename = "bridge")]
    Bridge,
    #[serde(rename = "10gbase-t")]
    TenGigBaseT,
    #[serde(rename = "10gbase-x-sfpp")]
    SfpPlus,
    #[serde(rename = "25gbase-x-sfp28")]
    Sfp28,
    #[serde(rename = "5gbase-t")]
    FiveGigBaseT,
    #[serde(rename = "2.5gbase-t")]
    TwoAndHalfGigBaseT,
    #[serde(rename = "1000base-t")]
    GigBaseT,
    #[serde(rename = "1000base-x-sfp")]
    Sfp,
    #[serde(rename = "other")]
    Other,
}

/// One far-end termination of a cable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableTermination {
    pub interface_id: i64,
    pub interface_name: String,
    pub device_id: i64,
}

/// Cable as seen from one interface: its id plus the terminations on the
/// far side. Cables are deleted and recreated on mismatch, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CableRef {
    pub id: i64,
    pub far_end: Vec<CableTermination>,
}

/// An interface record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub id: i64,
    pub device: i64,
    pub name: String,
    pub if_type: Option<InterfaceType>,
    pub enabled: bool,
    pub mtu: Option<Mtu>,
    /// Primary MAC; the full set lives in separate MAC-address objects
    pub mac_address: Option<MacAddress>,
    pub mode: Option<VlanMode>,
    pub tagged_vlans: Vec<VlanRef>,
    pub untagged_vlan: Option<VlanRef>,
    pub lag: Option<NamedRef>,
    pub bridge: Option<NamedRef>,
    pub cable: Option<CableRef>,
    pub duplex: Option<Duplex>,
    pub speed_kbps: Option<u64>,
    pub mgmt_only: bool,
}

/// Fields for creating an interface
#[derive(Debug, Clone, Serialize)]
pub struct NewInterface {
    pub device: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub if_type: InterfaceType,
    pub enabled: bool,
    pub mgmt_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<MacAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<Mtu>,
}

/// Accumulated interface changes, saved once per NIC.
///
/// Outer `Option` = "patch this field at all"; the inner `Option` on
/// clearable fields distinguishes "set to X" from "clear".
#[derive(Debug, Clone, Default)]
pub struct InterfacePatch {
    pub name: Option<String>,
    pub if_type: Option<InterfaceType>,
    pub mode: Option<Option<VlanMode>>,
    pub tagged_vlans: Option<Vec<i64>>,
    pub untagged_vlan: Option<Option<i64>>,
    pub lag: Option<Option<i64>>,
    pub bridge: Option<Option<i64>>,
    pub mtu: Option<Mtu>,
    pub primary_mac: Option<i64>,
    pub duplex: Option<Duplex>,
    pub speed_kbps: Option<u64>,
}

impl InterfacePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.if_type.is_none()
            && self.mode.is_none()
            && self.tagged_vlans.is_none()
            && self.untagged_vlan.is_none()
            && self.lag.is_none()
            && self.bridge.is_none()
            && self.mtu.is_none()
            && self.primary_mac.is_none()
            && self.duplex.is_none()
            && self.speed_kbps.is_none()
    }
}

/// A MAC-address object hanging off an interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacAddressObject {
    pub id: i64,
    pub mac_address: MacAddress,
}

/// IP address role; the engine only distinguishes anycast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpRole {
    Anycast,
    #[serde(other)]
    Other,
}

/// An IP address record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: i64,
    pub address: Cidr,
    pub role: Option<IpRole>,
    /// Interface the address is assigned to; None = unassigned
    pub assigned_interface: Option<i64>,
    /// Device owning the assigned interface, when NetBox reports it
    pub assigned_device: Option<i64>,
}

impl IpAddress {
    pub fn is_anycast(&self) -> bool {
        self.role == Some(IpRole::Anycast)
    }
}

/// Fields for creating an IP address
#[derive(Debug, Clone, Serialize)]
pub struct NewIpAddress {
    pub address: Cidr,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<IpRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<i64>,
}
