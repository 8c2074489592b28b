//! Normalized local facts consumed by the reconciliation engine
//!
//! The engine never shells out to lshw, ethtool or lldpctl itself. A
//! collector runs those tools, normalizes their output into the structures
//! below and hands the whole document to the engine (the CLI reads it as
//! JSON). Everything here is ephemeral: recomputed each run, never persisted
//! by the engine.

use serde::{Deserialize, Serialize};

use crate::domain::{Cidr, Duplex, MacAddress, Mtu, VlanId};

/// Full picture of one host for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostFacts {
    pub hostname: String,

    /// True when this host is a virtual machine; interfaces are then
    /// classified as Virtual and duplex/speed are not reconciled
    #[serde(default)]
    pub virtual_machine: bool,

    #[serde(default)]
    pub hardware: HardwareFacts,

    #[serde(default)]
    pub interfaces: Vec<InterfaceFact>,
}

/// Per-category component lists, in discovery order.
///
/// Discovery order is load-bearing for CPU and PSU: free bays are consumed
/// in list order, which is the defined tie-break when several components
/// could take several equally suitable bays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareFacts {
    #[serde(default)]
    pub cpus: Vec<CpuFact>,
    #[serde(default)]
    pub memory: Vec<MemoryFact>,
    #[serde(default)]
    pub disks: Vec<DiskFact>,
    #[serde(default)]
    pub raid_controllers: Vec<RaidControllerFact>,
    #[serde(default)]
    pub nic_cards: Vec<NicCardFact>,
    #[serde(default)]
    pub psus: Vec<PsuFact>,
}

/// A physical CPU package. CPUs have no stable slot identity the collector
/// can observe, so the part number extracted from the product string is the
/// only identity the engine gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuFact {
    /// Vendor product string, e.g. "Intel(R) Xeon(R) Gold 6230 CPU"
    pub product: String,
}

/// A memory DIMM with its physical slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub slot: String,
    /// Vendor part number, the module-type catalog key
    pub part_number: String,
}

/// A physical disk behind a RAID controller or directly attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskFact {
    pub serial: Option<String>,
    pub model: String,
    /// Controller-reported position as `ctrl:box:bay`; absent for disks the
    /// controller tooling could not place
    pub physical_id: Option<String>,
}

/// A RAID controller with its PCI slot position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidControllerFact {
    pub serial: Option<String>,
    /// Vendor product name, the module-type catalog key
    pub product: String,
    pub slot: Option<u32>,
    /// True for controllers in an external expansion enclosure
    #[serde(default)]
    pub external: bool,
}

/// A physical NIC card as reported by the platform descriptor tables.
///
/// Sub-ports of one card arrive collapsed into a single bay name by the
/// vendor-specific collector (see [`crate::inventory::policy::collapse_nic_bay`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicCardFact {
    pub model: String,
    pub serial: Option<String>,
    /// Bay name, e.g. "NIC.Slot.4.1"
    pub module_bay: String,
    /// Slot position within the bay prefix, e.g. "4"
    pub position: Option<String>,
    /// Free-form device location from the descriptor
    pub location: Option<String>,
}

/// A power supply unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsuFact {
    pub serial: String,
    /// Vendor product string, the module-type catalog key
    pub product: String,
}

/// One local network interface as observed by the collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceFact {
    pub name: String,
    pub mac: Option<MacAddress>,

    /// Configured addresses in CIDR notation, in kernel order
    #[serde(default)]
    pub addresses: Vec<Cidr>,

    /// 802.1Q tag when this is a VLAN sub-interface; None means untagged
    pub vlan: Option<VlanId>,

    pub mtu: Option<Mtu>,

    /// Link state; None when the tool could not tell
    pub link_up: Option<bool>,

    /// Negotiated speed in kbps; None is the tool's unknown sentinel
    pub speed_kbps: Option<u64>,

    /// Highest speed the port supports, in kbps; used for type
    /// classification, falling back to `speed_kbps` when absent
    pub max_speed_kbps: Option<u64>,

    pub duplex: Option<Duplex>,

    pub port_medium: Option<PortMedium>,

    /// Bonding master flag plus the slave names under it
    #[serde(default)]
    pub bonding: bool,
    #[serde(default)]
    pub bonding_slaves: Vec<String>,

    /// Bridge master flag plus the slave names under it
    #[serde(default)]
    pub bridge: bool,
    #[serde(default)]
    pub bridge_slaves: Vec<String>,

    /// Resolves under the kernel's virtual-devices path and is neither a
    /// bond nor a bridge
    #[serde(default)]
    pub virtual_device: bool,

    /// Out-of-band management port (IPMI/BMC)
    #[serde(default)]
    pub mgmt_only: bool,

    /// What LLDP heard on this port, when the collector ran it
    pub lldp: Option<LldpNeighbor>,
}

impl InterfaceFact {
    /// Speed used for type classification: the port's maximum, or the
    /// negotiated speed when the tool does not report a maximum
    pub fn classification_speed(&self) -> Option<u64> {
        self.max_speed_kbps.or(self.speed_kbps)
    }

    /// The MAC, unless it is the all-zero placeholder some drivers report
    /// for unprogrammed ports; that one is treated as no MAC at all
    pub fn effective_mac(&self) -> Option<MacAddress> {
        self.mac.filter(|mac| !mac.is_null())
    }
}

/// Physical port medium from the link tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortMedium {
    TwistedPair,
    Fibre,
    DirectAttach,
    Other,
}

impl PortMedium {
    /// Fibre and DAC ports take SFP-family types; twisted pair takes BASE-T
    pub fn is_modular(&self) -> bool {
        matches!(self, PortMedium::Fibre | PortMedium::DirectAttach)
    }
}

/// Link-layer discovery data for one port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LldpNeighbor {
    /// Management IP the peer advertised
    pub mgmt_ip: Option<String>,
    /// Peer port name
    pub port: Option<String>,
    /// Port VLAN id the peer flagged (PVID), signalling access mode
    pub pvid: Option<VlanId>,
}
