//! Bay/module reconciliation for hardware categories
//!
//! One generic convergence routine serves every category with deterministic
//! slot identity (RAID, disk, memory, NIC card); CPU and PSU have no stable
//! slot identity and take free bays in list order. Category-specific rules
//! come from [`policy`].
//!
//! Error policy: a component with malformed identity or an unresolvable
//! module type is skipped and counted, never failing the category; only a
//! capacity shortfall (CPU) aborts a category, and only transport errors
//! abort the run.

pub mod policy;

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info};

use crate::errors::SyncResult;
use crate::facts::{CpuFact, HardwareFacts, PsuFact};
use crate::netbox::types::{Module, ModuleBay, NewModule, NewModuleBay};
use crate::netbox::NetboxClient;
use crate::report::{CategoryOutcome, CategoryReport};
use policy::{cpu_part_number, Category, SlottedComponent, TypeKey};

/// Reconciles one device's hardware inventory against NetBox
pub struct InventorySync<'a> {
    client: &'a dyn NetboxClient,
    device: i64,
}

impl<'a> InventorySync<'a> {
    pub fn new(client: &'a dyn NetboxClient, device: i64) -> Self {
        Self { client, device }
    }

    /// Run every category in fixed order. Categories are independent: an
    /// abort in one never stops the others.
    pub async fn run(&self, hardware: &HardwareFacts) -> SyncResult<Vec<CategoryReport>> {
        let mut reports = Vec::new();
        reports.push(self.reconcile_cpus(&hardware.cpus).await?);
        reports.push(self.reconcile_memory(hardware).await?);
        reports.push(self.reconcile_disks(hardware).await?);
        reports.push(self.reconcile_raid(hardware).await?);
        reports.push(self.reconcile_nics(hardware).await?);
        reports.push(self.reconcile_psus(&hardware.psus).await?);
        Ok(reports)
    }

    async fn reconcile_memory(&self, hardware: &HardwareFacts) -> SyncResult<CategoryReport> {
        let components = hardware
            .memory
            .iter()
            .map(policy::resolve_memory)
            .map(Ok)
            .collect();
        self.reconcile_slotted(Category::Memory, components).await
    }

    async fn reconcile_disks(&self, hardware: &HardwareFacts) -> SyncResult<CategoryReport> {
        let components = hardware.disks.iter().map(policy::resolve_disk).collect();
        self.reconcile_slotted(Category::Disk, components).await
    }

    async fn reconcile_raid(&self, hardware: &HardwareFacts) -> SyncResult<CategoryReport> {
        let components = hardware
            .raid_controllers
            .iter()
            .map(policy::resolve_raid)
            .collect();
        self.reconcile_slotted(Category::RaidController, components)
            .await
    }

    async fn reconcile_nics(&self, hardware: &HardwareFacts) -> SyncResult<CategoryReport> {
        let components = hardware
            .nic_cards
            .iter()
            .map(policy::resolve_nic)
            .map(Ok)
            .collect();
        self.reconcile_slotted(Category::NicCard, components).await
    }

    /// Bays on this device whose name carries the category prefix
    async fn bays_with_prefix(&self, prefix: &str) -> SyncResult<Vec<ModuleBay>> {
        let mut bays = self.client.module_bays(self.device).await?;
        bays.retain(|bay| bay.name.starts_with(prefix));
        Ok(bays)
    }

    /// Modules on this device whose type carries the category profile
    async fn modules_with_profile(&self, profile: &str) -> SyncResult<Vec<Module>> {
        let mut modules = self.client.modules(self.device).await?;
        modules.retain(|module| {
            module
                .module_type
                .as_ref()
                .and_then(|t| t.profile.as_deref())
                == Some(profile)
        });
        Ok(modules)
    }

    async fn lookup_type(&self, key: &TypeKey) -> SyncResult<Option<i64>> {
        let module_type = self
            .client
            .module_type(key.part_number(), key.model())
            .await?;
        if let Some(ref t) = module_type {
            debug!(
                type_id = t.id,
                part_number = t.part_number.as_deref().unwrap_or(""),
                model = t.model.as_deref().unwrap_or(""),
                "Resolved module type"
            );
        }
        Ok(module_type.map(|t| t.id))
    }

    /// Generic convergence for categories with deterministic bay names.
    ///
    /// Per component: ensure the bay exists, evict an occupant whose
    /// identity does not match, then fill an empty bay from the catalog.
    async fn reconcile_slotted(
        &self,
        category: Category,
        components: Vec<Result<SlottedComponent, policy::IdentityError>>,
    ) -> SyncResult<CategoryReport> {
        let mut report = CategoryReport::new(category.name());

        let bays = self.bays_with_prefix(category.bay_prefix()).await?;
        let modules = self.modules_with_profile(category.profile()).await?;

        let mut bay_map: HashMap<String, ModuleBay> =
            bays.into_iter().map(|b| (b.name.clone(), b)).collect();
        let mut module_map: HashMap<String, Module> = modules
            .into_iter()
            .filter_map(|m| m.module_bay.as_ref().map(|bay| (bay.name.clone(), m.clone())))
            .collect();

        for component in components {
            let component = match component {
                Ok(component) => component,
                Err(policy::IdentityError(reason)) => {
                    error!(category = category.name(), %reason, "Skipping component");
                    report.skipped += 1;
                    continue;
                }
            };

            let bay_id = match bay_map.get(&component.bay_name) {
                Some(bay) => bay.id,
                None => {
                    info!(
                        category = category.name(),
                        bay = %component.bay_name,
                        "Creating module bay"
                    );
                    let bay = self
                        .client
                        .create_module_bay(&NewModuleBay {
                            device: self.device,
                            name: component.bay_name.clone(),
                            position: component.bay_position.clone(),
                            description: component.bay_description.clone(),
                        })
                        .await?;
                    report.created += 1;
                    let id = bay.id;
                    bay_map.insert(component.bay_name.clone(), bay);
                    id
                }
            };

            if let Some(occupant) = module_map.get(&component.bay_name) {
                if component.identity.matches(occupant) {
                    debug!(
                        category = category.name(),
                        bay = %component.bay_name,
                        "Module already in sync"
                    );
                    continue;
                }
                info!(
                    category = category.name(),
                    bay = %component.bay_name,
                    module = occupant.id,
                    "Deleting module with mismatched identity"
                );
                self.client.delete_module(occupant.id).await?;
                report.deleted += 1;
                module_map.remove(&component.bay_name);
            }

            let type_id = match self.lookup_type(&component.type_key).await? {
                Some(id) => id,
                None => {
                    error!(
                        category = category.name(),
                        bay = %component.bay_name,
                        key = ?component.type_key,
                        "No module type in catalog, skipping component"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            info!(
                category = category.name(),
                bay = %component.bay_name,
                "Creating module"
            );
            let module = self
                .client
                .create_module(&NewModule {
                    device: self.device,
                    module_bay: bay_id,
                    module_type: type_id,
                    status: "active".to_string(),
                    serial: component.serial.clone(),
                })
                .await?;
            report.created += 1;
            module_map.insert(component.bay_name.clone(), module);
        }

        Ok(report)
    }

    /// CPUs have no slot identity: a module whose part number matches any
    /// local CPU consumes a bay silently, the rest pop free bays in order.
    async fn reconcile_cpus(&self, cpus: &[CpuFact]) -> SyncResult<CategoryReport> {
        let category = Category::Cpu;
        let mut report = CategoryReport::new(category.name());

        let mut bays = self.bays_with_prefix(category.bay_prefix()).await?;
        let mut modules = self.modules_with_profile(category.profile()).await?;

        if bays.is_empty() || cpus.len() > bays.len() {
            error!(
                device = self.device,
                bays = bays.len(),
                cpus = cpus.len(),
                "Not enough CPU module bays, aborting category"
            );
            report.outcome = CategoryOutcome::Aborted;
            return Ok(report);
        }

        for cpu in cpus {
            let part_number = match cpu_part_number(&cpu.product) {
                Some(pn) => pn,
                None => {
                    error!(product = %cpu.product, "Cannot derive CPU part number, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            // A module with this part number anywhere satisfies this CPU;
            // retire its bay+module pair from the pools without touching it.
            if let Some(pos) = modules.iter().position(|m| {
                m.module_type
                    .as_ref()
                    .and_then(|t| t.part_number.as_deref())
                    == Some(part_number.as_str())
            }) {
                let satisfied = modules.remove(pos);
                if let Some(bay) = satisfied.module_bay {
                    debug!(
                        part_number = %part_number,
                        bay = %bay.name,
                        "CPU already present"
                    );
                    bays.retain(|b| b.name != bay.name);
                }
                continue;
            }

            let Some(bay) = (!bays.is_empty()).then(|| bays.remove(0)) else {
                error!(part_number = %part_number, "No free CPU bay, skipping");
                report.skipped += 1;
                continue;
            };

            let type_id = match self
                .lookup_type(&TypeKey::PartNumber(part_number.clone()))
                .await?
            {
                Some(id) => id,
                None => {
                    error!(
                        part_number = %part_number,
                        "No module type for CPU, skipping"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            info!(part_number = %part_number, bay = %bay.name, "Creating CPU module");
            self.client
                .create_module(&NewModule {
                    device: self.device,
                    module_bay: bay.id,
                    module_type: type_id,
                    status: "active".to_string(),
                    serial: None,
                })
                .await?;
            report.created += 1;
        }

        Ok(report)
    }

    /// PSU convergence is an explicit three-phase pipeline: garbage-collect
    /// departed serials, reserve bays of matching serials, allocate the
    /// remaining local PSUs into free bays.
    async fn reconcile_psus(&self, psus: &[PsuFact]) -> SyncResult<CategoryReport> {
        let category = Category::Psu;
        let mut report = CategoryReport::new(category.name());

        let mut bays = self.bays_with_prefix(category.bay_prefix()).await?;
        let modules = self.modules_with_profile(category.profile()).await?;

        let local_serials: HashSet<&str> = psus.iter().map(|p| p.serial.as_str()).collect();

        // Phase 1: garbage-collect modules whose serial left the chassis.
        // This must finish before allocation so their bays free up.
        let mut surviving = Vec::new();
        for module in modules {
            let departed = module
                .serial
                .as_deref()
                .map_or(true, |serial| !local_serials.contains(serial));
            if departed {
                info!(
                    serial = module.serial.as_deref().unwrap_or("<none>"),
                    module = module.id,
                    "Deleting PSU module not present locally"
                );
                self.client.delete_module(module.id).await?;
                report.deleted += 1;
            } else {
                surviving.push(module);
            }
        }

        // Phase 2: reserve bays already correctly occupied.
        for module in &surviving {
            if let Some(bay) = &module.module_bay {
                bays.retain(|b| b.name != bay.name);
            }
        }

        // Phase 3: allocate the rest.
        for psu in psus {
            let already_present = surviving
                .iter()
                .any(|m| m.serial.as_deref() == Some(psu.serial.as_str()));
            if already_present {
                debug!(serial = %psu.serial, "PSU already present");
                continue;
            }

            let type_id = match self
                .lookup_type(&TypeKey::PartNumber(psu.product.clone()))
                .await?
            {
                Some(id) => id,
                None => {
                    error!(product = %psu.product, "No module type for PSU, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            let Some(bay) = (!bays.is_empty()).then(|| bays.remove(0)) else {
                error!(serial = %psu.serial, "No free PSU bay, skipping");
                report.skipped += 1;
                continue;
            };

            info!(serial = %psu.serial, bay = %bay.name, "Creating PSU module");
            self.client
                .create_module(&NewModule {
                    device: self.device,
                    module_bay: bay.id,
                    module_type: type_id,
                    status: "active".to_string(),
                    serial: Some(psu.serial.clone()),
                })
                .await?;
            report.created += 1;
        }

        Ok(report)
    }
}
