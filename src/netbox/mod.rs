//! NetBox inventory client
//!
//! [`NetboxClient`] is the narrow seam between the reconciliation engine and
//! the remote inventory. The engine only ever sees these operations; the
//! production implementation ([`http::NetboxHttp`]) speaks the REST API,
//! tests substitute an in-memory double.
//!
//! Lookup misses are normal outcomes (`Ok(None)` / empty `Vec`), distinct
//! from transport errors, which abort the run.

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::domain::{MacAddress, VlanId};
use crate::errors::SyncResult;
use types::{
    CableRef, Device, Interface, InterfacePatch, IpAddress, MacAddressObject, Module, ModuleBay,
    ModuleType, NewInterface, NewIpAddress, NewModule, NewModuleBay, Vlan,
};

/// Operations the engine needs from the remote inventory.
///
/// All calls are request/response; the engine issues them strictly
/// sequentially and performs no retries (a transient failure aborts the run
/// and the next run converges from wherever this one stopped).
#[async_trait]
pub trait NetboxClient: Send + Sync {
    /// Look up a device by name
    async fn device_by_name(&self, name: &str) -> SyncResult<Option<Device>>;

    /// All module bays on a device
    async fn module_bays(&self, device: i64) -> SyncResult<Vec<ModuleBay>>;

    async fn create_module_bay(&self, new: &NewModuleBay) -> SyncResult<ModuleBay>;

    /// All modules installed on a device
    async fn modules(&self, device: i64) -> SyncResult<Vec<Module>>;

    async fn create_module(&self, new: &NewModule) -> SyncResult<Module>;

    async fn delete_module(&self, id: i64) -> SyncResult<()>;

    /// Module-type catalog lookup by part number and/or model.
    ///
    /// With both keys given, both must match. The engine never creates
    /// module types.
    async fn module_type(
        &self,
        part_number: Option<&str>,
        model: Option<&str>,
    ) -> SyncResult<Option<ModuleType>>;

    /// All interfaces owned by a device
    async fn interfaces(&self, device: i64) -> SyncResult<Vec<Interface>>;

    async fn interface_by_name(&self, device: i64, name: &str) -> SyncResult<Option<Interface>>;

    /// The management-only interface of a device, if it has one
    async fn management_interface(&self, device: i64) -> SyncResult<Option<Interface>>;

    async fn create_interface(&self, new: &NewInterface) -> SyncResult<Interface>;

    async fn update_interface(&self, id: i64, patch: &InterfacePatch) -> SyncResult<Interface>;

    async fn delete_interface(&self, id: i64) -> SyncResult<()>;

    /// MAC-address objects bound to an interface
    async fn interface_macs(&self, interface: i64) -> SyncResult<Vec<MacAddressObject>>;

    async fn create_interface_mac(
        &self,
        interface: i64,
        mac: &MacAddress,
    ) -> SyncResult<MacAddressObject>;

    async fn delete_mac(&self, id: i64) -> SyncResult<()>;

    async fn vlan_by_vid(&self, vid: VlanId) -> SyncResult<Option<Vlan>>;

    async fn create_vlan(&self, vid: VlanId, name: &str) -> SyncResult<Vlan>;

    /// All IP records matching an address string. A bare address matches
    /// any prefix length, which is how switch management IPs are resolved.
    async fn ip_addresses(&self, address: &str) -> SyncResult<Vec<IpAddress>>;

    /// All IP records assigned to interfaces of a device
    async fn ip_addresses_for_device(&self, device: i64) -> SyncResult<Vec<IpAddress>>;

    /// The IP record assigned to one interface, if any
    async fn ip_for_interface(&self, interface: i64) -> SyncResult<Option<IpAddress>>;

    async fn create_ip_address(&self, new: &NewIpAddress) -> SyncResult<IpAddress>;

    /// Reassign (or with `None`, unassign) an IP record. The record itself
    /// is never deleted by the engine.
    async fn assign_ip_address(&self, id: i64, interface: Option<i64>) -> SyncResult<IpAddress>;

    /// Create a cable between a local and a peer interface
    async fn create_cable(&self, a_interface: i64, b_interface: i64) -> SyncResult<CableRef>;

    async fn delete_cable(&self, id: i64) -> SyncResult<()>;
}

/// Helper shared by engine code: look up a VLAN by vid, creating it with
/// the conventional `VLAN {vid}` name when absent. VLANs are never deleted.
pub async fn get_or_create_vlan(client: &dyn NetboxClient, vid: VlanId) -> SyncResult<Vlan> {
    if let Some(vlan) = client.vlan_by_vid(vid).await? {
        return Ok(vlan);
    }
    tracing::info!(vid = vid.value(), "Creating missing VLAN");
    client.create_vlan(vid, &format!("VLAN {}", vid)).await
}
