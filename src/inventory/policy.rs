//! Category policy: naming, occupancy and identity rules per hardware
//! category
//!
//! One shared reconciler routine handles every category; everything
//! category-specific lives here as data. Bay names are pure functions of
//! category plus identity attributes, so repeated runs always resolve a
//! component to the same bay.

use std::sync::LazyLock;

use regex::Regex;

use crate::facts::{DiskFact, MemoryFact, NicCardFact, RaidControllerFact};
use crate::netbox::types::Module;

/// Hardware category under reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Cpu,
    Memory,
    Disk,
    RaidController,
    NicCard,
    Psu,
}

/// How components take bays in a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// The component's attributes determine its bay name
    Deterministic,
    /// No stable slot identity; free bays are consumed in list order
    PopOrder,
}

impl Category {
    /// Bay-name prefix used to scope remote bay queries
    pub fn bay_prefix(&self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Disk => "Disk",
            Category::RaidController => "RAID",
            Category::NicCard => "NIC",
            Category::Psu => "PSU",
        }
    }

    /// Module-type profile name used to scope remote module queries
    pub fn profile(&self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Disk => "Hard disk",
            Category::RaidController => "RAID Controller",
            Category::NicCard => "NIC",
            Category::Psu => "Power supply",
        }
    }

    pub fn occupancy(&self) -> Occupancy {
        match self {
            Category::Cpu | Category::Psu => Occupancy::PopOrder,
            _ => Occupancy::Deterministic,
        }
    }

    /// Label used in logs and the run report
    pub fn name(&self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Memory => "memory",
            Category::Disk => "disk",
            Category::RaidController => "raid",
            Category::NicCard => "nic",
            Category::Psu => "psu",
        }
    }
}

/// Module-type catalog lookup key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKey {
    PartNumber(String),
    Model(String),
}

impl TypeKey {
    pub fn part_number(&self) -> Option<&str> {
        match self {
            TypeKey::PartNumber(pn) => Some(pn),
            TypeKey::Model(_) => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            TypeKey::PartNumber(_) => None,
            TypeKey::Model(m) => Some(m),
        }
    }
}

/// What makes an installed module "the same component" as the local one.
///
/// A mismatch always deletes and recreates the module; the engine never
/// patches type or serial in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleIdentity {
    /// Compare module serials (RAID controllers, PSUs)
    Serial(Option<String>),
    /// Compare the installed module type's model (disks, NIC cards)
    TypeModel(String),
    /// Compare the installed module type's part number (memory)
    TypePartNumber(String),
}

impl ModuleIdentity {
    pub fn matches(&self, module: &Module) -> bool {
        match self {
            ModuleIdentity::Serial(serial) => module.serial.as_deref() == serial.as_deref(),
            ModuleIdentity::TypeModel(model) => {
                module
                    .module_type
                    .as_ref()
                    .and_then(|t| t.model.as_deref())
                    == Some(model.as_str())
            }
            ModuleIdentity::TypePartNumber(pn) => {
                module
                    .module_type
                    .as_ref()
                    .and_then(|t| t.part_number.as_deref())
                    == Some(pn.as_str())
            }
        }
    }
}

/// A local component resolved to its deterministic bay
#[derive(Debug, Clone)]
pub struct SlottedComponent {
    pub bay_name: String,
    pub identity: ModuleIdentity,
    pub type_key: TypeKey,
    pub serial: Option<String>,
    /// Extra bay attributes carried through on bay creation (NIC cards)
    pub bay_position: Option<String>,
    pub bay_description: Option<String>,
}

impl SlottedComponent {
    fn plain(bay_name: String, identity: ModuleIdentity, type_key: TypeKey) -> Self {
        Self {
            bay_name,
            identity,
            type_key,
            serial: None,
            bay_position: None,
            bay_description: None,
        }
    }
}

/// Why a component could not be resolved to a bay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError(pub String);

/// RAID controllers sit either in an embedded slot (1-based in the bay
/// name) or a PCI expansion slot (slot number kept as-is).
pub fn resolve_raid(fact: &RaidControllerFact) -> Result<SlottedComponent, IdentityError> {
    let slot = fact.slot.ok_or_else(|| {
        IdentityError(format!("RAID controller {} has no slot", fact.product))
    })?;
    let bay_name = if fact.external {
        format!("RAID.Slot.{}.1", slot)
    } else {
        format!("RAID.Emb.{}.1", slot + 1)
    };
    Ok(SlottedComponent {
        serial: fact.serial.clone(),
        ..SlottedComponent::plain(
            bay_name,
            ModuleIdentity::Serial(fact.serial.clone()),
            TypeKey::Model(fact.product.clone()),
        )
    })
}

/// Disks are named after the controller-reported `ctrl:box:bay` position
pub fn resolve_disk(fact: &DiskFact) -> Result<SlottedComponent, IdentityError> {
    let physical_id = fact
        .physical_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            IdentityError(format!("disk {} has no physical identifier", fact.model))
        })?;

    let mut parts = physical_id.split(':');
    let (_ctrl, box_id, bay_id) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(c), Some(b), Some(d), None) => (c, b, d),
        _ => {
            return Err(IdentityError(format!(
                "disk {} has malformed physical identifier '{}'",
                fact.model, physical_id
            )))
        }
    };

    Ok(SlottedComponent::plain(
        format!("Disk Box {} Bay {}", box_id, bay_id),
        ModuleIdentity::TypeModel(fact.model.clone()),
        TypeKey::Model(fact.model.clone()),
    ))
}

/// Memory DIMMs are named after their slot
pub fn resolve_memory(fact: &MemoryFact) -> SlottedComponent {
    SlottedComponent::plain(
        format!("Memory {}", fact.slot),
        ModuleIdentity::TypePartNumber(fact.part_number.clone()),
        TypeKey::PartNumber(fact.part_number.clone()),
    )
}

/// NIC cards carry their bay name in the platform descriptor; sub-ports of
/// one card are collapsed into a single bay
pub fn resolve_nic(fact: &NicCardFact) -> SlottedComponent {
    let (bay_name, derived_position) = match collapse_nic_bay(&fact.module_bay) {
        Some((bay, position)) => (bay, Some(position)),
        None => (fact.module_bay.clone(), None),
    };
    SlottedComponent {
        serial: fact.serial.clone(),
        bay_position: fact.position.clone().or(derived_position),
        bay_description: fact.location.clone(),
        ..SlottedComponent::plain(
            bay_name,
            ModuleIdentity::TypeModel(fact.model.clone()),
            TypeKey::Model(fact.model.clone()),
        )
    }
}

/// Collapse a structured NIC location name (`NIC.<loc>.<slot>.<port>`) into
/// one bay per physical card by forcing the port index to 1. Returns the
/// bay name and the slot position, or None when the name has another shape.
pub fn collapse_nic_bay(structured_name: &str) -> Option<(String, String)> {
    let mut parts = structured_name.split('.');
    let (nic, loc, slot, port) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || nic != "NIC" {
        return None;
    }
    if loc.is_empty() || !loc.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if slot.is_empty() || !slot.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((format!("NIC.{}.{}.1", loc, slot), slot.to_string()))
}

/// Extract a normalized part number from a CPU product string.
///
/// Accepts an optional letter-digit-dash prefix, four digits, then an
/// optional one-letter and/or one-digit suffix separated by whitespace;
/// whitespace is dropped from the result. "Intel(R) Xeon(R) CPU E5-2650 v4
/// @ 2.20GHz" yields "E5-2650v4", "Intel(R) Xeon(R) Silver 4214R CPU"
/// yields "4214R". The suffix grab is greedy, so it can swallow the first
/// character of a following token; catalog part numbers are created from
/// the same extraction, so lookups still line up.
pub fn cpu_part_number(product: &str) -> Option<String> {
    static PART_NUMBER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([A-Za-z][0-9]-)?\d{4}\s*[A-Za-z]?[0-9]?").unwrap());

    PART_NUMBER
        .find(product)
        .map(|m| m.as_str().replace(' ', ""))
}
