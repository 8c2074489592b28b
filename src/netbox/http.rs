//! REST implementation of [`NetboxClient`]
//!
//! Thin translation layer: token-authenticated `reqwest` client, JSON in
//! and out, NetBox's nested `{value, label}` choice wrappers and generic
//! assigned-object references flattened into the engine's record types.
//! No reconciliation decisions live here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::types::{
    CableRef, CableTermination, Device, Interface, InterfacePatch, InterfaceType, IpAddress,
    IpRole, MacAddressObject, Module, ModuleBay, ModuleType, NamedRef, NewInterface, NewIpAddress,
    NewModule, NewModuleBay, Vlan, VlanMode, VlanRef,
};
use super::NetboxClient;
use crate::config::NetboxConfig;
use crate::domain::{Cidr, Duplex, MacAddress, Mtu, VlanId};
use crate::errors::{SyncError, SyncResult};

/// NetBox REST API client
pub struct NetboxHttp {
    base_url: String,
    client: Client,
}

impl NetboxHttp {
    pub fn new(config: &NetboxConfig) -> SyncResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Token {}", config.api_token)
                .parse()
                .map_err(|e| SyncError::Configuration(format!("Invalid API token: {e}")))?,
        );
        headers.insert(
            "Content-Type",
            "application/json"
                .parse()
                .map_err(|e| SyncError::Configuration(format!("Invalid header: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> SyncResult<Vec<T>> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        let response = check(response).await?;
        let page: Page<T> = response.json().await?;
        Ok(page.results)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> SyncResult<T> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> SyncResult<T> {
        let url = self.url(path);
        debug!(%url, "PATCH");
        let response = self.client.patch(&url).json(body).send().await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, path: &str) -> SyncResult<()> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        let response = self.client.delete(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Already gone; deletion is idempotent from the engine's view
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> SyncResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

fn enc(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[derive(Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

/// NetBox choice fields arrive as `{"value": ..., "label": ...}`
#[derive(Deserialize)]
struct Choice {
    value: Value,
}

impl Choice {
    /// Decode the inner value into a known enum; unknown slugs become None
    fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.value.clone()).ok()
    }
}

#[derive(Deserialize)]
struct IdRef {
    id: i64,
}

#[derive(Deserialize)]
struct RawNamedRef {
    id: i64,
    name: String,
}

impl From<RawNamedRef> for NamedRef {
    fn from(raw: RawNamedRef) -> Self {
        NamedRef {
            id: raw.id,
            name: raw.name,
        }
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
struct RawDevice {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct RawModuleBay {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
struct RawModuleTypeProfile {
    name: String,
}

#[derive(Deserialize)]
struct RawModuleType {
    id: i64,
    model: Option<String>,
    part_number: Option<String>,
    profile: Option<RawModuleTypeProfile>,
}

impl From<RawModuleType> for ModuleType {
    fn from(raw: RawModuleType) -> Self {
        ModuleType {
            id: raw.id,
            model: none_if_empty(raw.model),
            part_number: none_if_empty(raw.part_number),
            profile: raw.profile.map(|p| p.name),
        }
    }
}

#[derive(Deserialize)]
struct RawModule {
    id: i64,
    module_bay: Option<RawNamedRef>,
    module_type: Option<RawModuleType>,
    serial: Option<String>,
}

impl From<RawModule> for Module {
    fn from(raw: RawModule) -> Self {
        Module {
            id: raw.id,
            module_bay: raw.module_bay.map(Into::into),
            module_type: raw.module_type.map(Into::into),
            serial: none_if_empty(raw.serial),
        }
    }
}

#[derive(Deserialize)]
struct RawVlan {
    id: i64,
    vid: u16,
    name: String,
}

#[derive(Deserialize)]
struct RawVlanRef {
    id: i64,
    vid: u16,
}

#[derive(Deserialize)]
struct RawCable {
    id: i64,
}

#[derive(Deserialize)]
struct RawLinkPeer {
    id: i64,
    name: String,
    device: Option<IdRef>,
}

#[derive(Deserialize)]
struct RawInterface {
    id: i64,
    device: IdRef,
    name: String,
    #[serde(rename = "type")]
    if_type: Option<Choice>,
    enabled: bool,
    mtu: Option<u32>,
    primary_mac_address: Option<RawMacRef>,
    mode: Option<Choice>,
    #[serde(default)]
    tagged_vlans: Vec<RawVlanRef>,
    untagged_vlan: Option<RawVlanRef>,
    lag: Option<RawNamedRef>,
    bridge: Option<RawNamedRef>,
    cable: Option<RawCable>,
    link_peers_type: Option<String>,
    #[serde(default)]
    link_peers: Vec<RawLinkPeer>,
    duplex: Option<Choice>,
    speed: Option<u64>,
    #[serde(default)]
    mgmt_only: bool,
}

#[derive(Deserialize)]
struct RawMacRef {
    mac_address: String,
}

fn vlan_ref(raw: RawVlanRef) -> SyncResult<VlanRef> {
    let vid = VlanId::new(raw.vid)
        .map_err(|e| SyncError::Deserialization(format!("VLAN {}: {e}", raw.id)))?;
    Ok(VlanRef { id: raw.id, vid })
}

impl RawInterface {
    fn into_interface(self) -> SyncResult<Interface> {
        let mac_address = match self.primary_mac_address {
            Some(raw) => Some(
                MacAddress::new(&raw.mac_address)
                    .map_err(|e| SyncError::Deserialization(e.to_string()))?,
            ),
            None => None,
        };

        let cable = match self.cable {
            Some(raw) if self.link_peers_type.as_deref() == Some("dcim.interface") => {
                Some(CableRef {
                    id: raw.id,
                    far_end: self
                        .link_peers
                        .into_iter()
                        .map(|p| CableTermination {
                            interface_id: p.id,
                            interface_name: p.name,
                            device_id: p.device.map(|d| d.id).unwrap_or_default(),
                        })
                        .collect(),
                })
            }
            // Cabled to something that is not an interface (front/rear
            // port, circuit); the engine treats that as out of scope
            Some(raw) => Some(CableRef {
                id: raw.id,
                far_end: Vec::new(),
            }),
            None => None,
        };

        Ok(Interface {
            id: self.id,
            device: self.device.id,
            name: self.name,
            if_type: self.if_type.and_then(|c| c.decode::<InterfaceType>()),
            enabled: self.enabled,
            mtu: self.mtu.map(Mtu::new),
            mac_address,
            mode: self.mode.and_then(|c| c.decode::<VlanMode>()),
            tagged_vlans: self
                .tagged_vlans
                .into_iter()
                .map(vlan_ref)
                .collect::<SyncResult<_>>()?,
            untagged_vlan: self.untagged_vlan.map(vlan_ref).transpose()?,
            lag: self.lag.map(Into::into),
            bridge: self.bridge.map(Into::into),
            cable,
            duplex: self.duplex.and_then(|c| c.decode::<Duplex>()),
            speed_kbps: self.speed,
            mgmt_only: self.mgmt_only,
        })
    }
}

#[derive(Deserialize)]
struct RawAssignedObject {
    device: Option<IdRef>,
}

#[derive(Deserialize)]
struct RawIpAddress {
    id: i64,
    address: String,
    role: Option<Choice>,
    assigned_object_type: Option<String>,
    assigned_object_id: Option<i64>,
    assigned_object: Option<RawAssignedObject>,
}

impl RawIpAddress {
    fn into_ip(self) -> SyncResult<IpAddress> {
        let address =
            Cidr::new(&self.address).map_err(|e| SyncError::Deserialization(e.to_string()))?;

        let interface_bound = matches!(
            self.assigned_object_type.as_deref(),
            Some("dcim.interface") | Some("virtualization.vminterface")
        );

        Ok(IpAddress {
            id: self.id,
            address,
            role: self.role.and_then(|c| c.decode::<IpRole>()),
            assigned_interface: if interface_bound {
                self.assigned_object_id
            } else {
                None
            },
            assigned_device: self
                .assigned_object
                .and_then(|o| o.device)
                .map(|d| d.id),
        })
    }
}

#[derive(Deserialize)]
struct RawMacObject {
    id: i64,
    mac_address: String,
}

#[async_trait]
impl NetboxClient for NetboxHttp {
    async fn device_by_name(&self, name: &str) -> SyncResult<Option<Device>> {
        let raws: Vec<RawDevice> = self
            .get_list(&format!("/api/dcim/devices/?name={}", enc(name)))
            .await?;
        Ok(raws.into_iter().next().map(|d| Device {
            id: d.id,
            name: d.name,
        }))
    }

    async fn module_bays(&self, device: i64) -> SyncResult<Vec<ModuleBay>> {
        let raws: Vec<RawModuleBay> = self
            .get_list(&format!("/api/dcim/module-bays/?device_id={device}&limit=0"))
            .await?;
        Ok(raws
            .into_iter()
            .map(|b| ModuleBay {
                id: b.id,
                name: b.name,
            })
            .collect())
    }

    async fn create_module_bay(&self, new: &NewModuleBay) -> SyncResult<ModuleBay> {
        let raw: RawModuleBay = self
            .post("/api/dcim/module-bays/", &serde_json::to_value(new)?)
            .await?;
        Ok(ModuleBay {
            id: raw.id,
            name: raw.name,
        })
    }

    async fn modules(&self, device: i64) -> SyncResult<Vec<Module>> {
        let raws: Vec<RawModule> = self
            .get_list(&format!("/api/dcim/modules/?device_id={device}&limit=0"))
            .await?;
        Ok(raws.into_iter().map(Into::into).collect())
    }

    async fn create_module(&self, new: &NewModule) -> SyncResult<Module> {
        let raw: RawModule = self
            .post("/api/dcim/modules/", &serde_json::to_value(new)?)
            .await?;
        Ok(raw.into())
    }

    async fn delete_module(&self, id: i64) -> SyncResult<()> {
        self.delete(&format!("/api/dcim/modules/{id}/")).await
    }

    async fn module_type(
        &self,
        part_number: Option<&str>,
        model: Option<&str>,
    ) -> SyncResult<Option<ModuleType>> {
        let mut query = Vec::new();
        if let Some(pn) = part_number {
            query.push(format!("part_number={}", enc(pn)));
        }
        if let Some(m) = model {
            query.push(format!("model={}", enc(m)));
        }
        if query.is_empty() {
            return Ok(None);
        }
        let raws: Vec<RawModuleType> = self
            .get_list(&format!("/api/dcim/module-types/?{}", query.join("&")))
            .await?;
        Ok(raws.into_iter().next().map(Into::into))
    }

    async fn interfaces(&self, device: i64) -> SyncResult<Vec<Interface>> {
        let raws: Vec<RawInterface> = self
            .get_list(&format!("/api/dcim/interfaces/?device_id={device}&limit=0"))
            .await?;
        raws.into_iter().map(RawInterface::into_interface).collect()
    }

    async fn interface_by_name(&self, device: i64, name: &str) -> SyncResult<Option<Interface>> {
        let raws: Vec<RawInterface> = self
            .get_list(&format!(
                "/api/dcim/interfaces/?device_id={device}&name={}",
                enc(name)
            ))
            .await?;
        raws.into_iter()
            .next()
            .map(RawInterface::into_interface)
            .transpose()
    }

    async fn management_interface(&self, device: i64) -> SyncResult<Option<Interface>> {
        let raws: Vec<RawInterface> = self
            .get_list(&format!(
                "/api/dcim/interfaces/?device_id={device}&mgmt_only=true"
            ))
            .await?;
        raws.into_iter()
            .next()
            .map(RawInterface::into_interface)
            .transpose()
    }

    async fn create_interface(&self, new: &NewInterface) -> SyncResult<Interface> {
        let raw: RawInterface = self
            .post("/api/dcim/interfaces/", &serde_json::to_value(new)?)
            .await?;
        raw.into_interface()
    }

    async fn update_interface(&self, id: i64, patch: &InterfacePatch) -> SyncResult<Interface> {
        let raw: RawInterface = self
            .patch(&format!("/api/dcim/interfaces/{id}/"), &patch_body(patch))
            .await?;
        raw.into_interface()
    }

    async fn delete_interface(&self, id: i64) -> SyncResult<()> {
        self.delete(&format!("/api/dcim/interfaces/{id}/")).await
    }

    async fn interface_macs(&self, interface: i64) -> SyncResult<Vec<MacAddressObject>> {
        let raws: Vec<RawMacObject> = self
            .get_list(&format!("/api/dcim/mac-addresses/?interface_id={interface}"))
            .await?;
        raws.into_iter()
            .map(|raw| {
                Ok(MacAddressObject {
                    id: raw.id,
                    mac_address: MacAddress::new(&raw.mac_address)
                        .map_err(|e| SyncError::Deserialization(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn create_interface_mac(
        &self,
        interface: i64,
        mac: &MacAddress,
    ) -> SyncResult<MacAddressObject> {
        let body = json!({
            "mac_address": mac.as_str(),
            "assigned_object_type": "dcim.interface",
            "assigned_object_id": interface,
        });
        let raw: RawMacObject = self.post("/api/dcim/mac-addresses/", &body).await?;
        Ok(MacAddressObject {
            id: raw.id,
            mac_address: MacAddress::new(&raw.mac_address)
                .map_err(|e| SyncError::Deserialization(e.to_string()))?,
        })
    }

    async fn delete_mac(&self, id: i64) -> SyncResult<()> {
        self.delete(&format!("/api/dcim/mac-addresses/{id}/")).await
    }

    async fn vlan_by_vid(&self, vid: VlanId) -> SyncResult<Option<Vlan>> {
        let raws: Vec<RawVlan> = self
            .get_list(&format!("/api/ipam/vlans/?vid={}", vid.value()))
            .await?;
        raws.into_iter()
            .next()
            .map(|raw| {
                Ok(Vlan {
                    id: raw.id,
                    vid: VlanId::new(raw.vid)
                        .map_err(|e| SyncError::Deserialization(e.to_string()))?,
                    name: raw.name,
                })
            })
            .transpose()
    }

    async fn create_vlan(&self, vid: VlanId, name: &str) -> SyncResult<Vlan> {
        let body = json!({ "vid": vid.value(), "name": name });
        let raw: RawVlan = self.post("/api/ipam/vlans/", &body).await?;
        Ok(Vlan {
            id: raw.id,
            vid: VlanId::new(raw.vid).map_err(|e| SyncError::Deserialization(e.to_string()))?,
            name: raw.name,
        })
    }

    async fn ip_addresses(&self, address: &str) -> SyncResult<Vec<IpAddress>> {
        let raws: Vec<RawIpAddress> = self
            .get_list(&format!("/api/ipam/ip-addresses/?address={}", enc(address)))
            .await?;
        raws.into_iter().map(RawIpAddress::into_ip).collect()
    }

    async fn ip_addresses_for_device(&self, device: i64) -> SyncResult<Vec<IpAddress>> {
        let raws: Vec<RawIpAddress> = self
            .get_list(&format!(
                "/api/ipam/ip-addresses/?device_id={device}&limit=0"
            ))
            .await?;
        raws.into_iter().map(RawIpAddress::into_ip).collect()
    }

    async fn ip_for_interface(&self, interface: i64) -> SyncResult<Option<IpAddress>> {
        let raws: Vec<RawIpAddress> = self
            .get_list(&format!("/api/ipam/ip-addresses/?interface_id={interface}"))
            .await?;
        raws.into_iter().next().map(RawIpAddress::into_ip).transpose()
    }

    async fn create_ip_address(&self, new: &NewIpAddress) -> SyncResult<IpAddress> {
        let mut body = serde_json::to_value(new)?;
        if let (Some(interface), Some(map)) = (new.interface, body.as_object_mut()) {
            // NetBox binds IPs through a generic assigned-object pair
            map.remove("interface");
            map.insert(
                "assigned_object_type".to_string(),
                json!("dcim.interface"),
            );
            map.insert("assigned_object_id".to_string(), json!(interface));
        }
        let raw: RawIpAddress = self.post("/api/ipam/ip-addresses/", &body).await?;
        raw.into_ip()
    }

    async fn assign_ip_address(&self, id: i64, interface: Option<i64>) -> SyncResult<IpAddress> {
        let body = match interface {
            Some(interface) => json!({
                "assigned_object_type": "dcim.interface",
                "assigned_object_id": interface,
            }),
            None => json!({
                "assigned_object_type": Value::Null,
                "assigned_object_id": Value::Null,
            }),
        };
        let raw: RawIpAddress = self
            .patch(&format!("/api/ipam/ip-addresses/{id}/"), &body)
            .await?;
        raw.into_ip()
    }

    async fn create_cable(&self, a_interface: i64, b_interface: i64) -> SyncResult<CableRef> {
        let body = json!({
            "a_terminations": [
                { "object_type": "dcim.interface", "object_id": a_interface },
            ],
            "b_terminations": [
                { "object_type": "dcim.interface", "object_id": b_interface },
            ],
        });
        let raw: RawCable = self.post("/api/dcim/cables/", &body).await?;
        Ok(CableRef {
            id: raw.id,
            far_end: Vec::new(),
        })
    }

    async fn delete_cable(&self, id: i64) -> SyncResult<()> {
        self.delete(&format!("/api/dcim/cables/{id}/")).await
    }
}

fn patch_body(patch: &InterfacePatch) -> Value {
    let mut body = Map::new();
    if let Some(name) = &patch.name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(if_type) = &patch.if_type {
        body.insert("type".to_string(), json!(if_type));
    }
    if let Some(mode) = &patch.mode {
        body.insert(
            "mode".to_string(),
            match mode {
                Some(mode) => json!(mode),
                // NetBox expects a blank string to clear a choice field
                None => json!(""),
            },
        );
    }
    if let Some(tagged) = &patch.tagged_vlans {
        body.insert("tagged_vlans".to_string(), json!(tagged));
    }
    if let Some(untagged) = &patch.untagged_vlan {
        body.insert("untagged_vlan".to_string(), json!(untagged));
    }
    if let Some(lag) = &patch.lag {
        body.insert("lag".to_string(), json!(lag));
    }
    if let Some(bridge) = &patch.bridge {
        body.insert("bridge".to_string(), json!(bridge));
    }
    if let Some(mtu) = &patch.mtu {
        body.insert("mtu".to_string(), json!(mtu.value()));
    }
    if let Some(mac_id) = &patch.primary_mac {
        body.insert("primary_mac_address".to_string(), json!({ "id": mac_id }));
    }
    if let Some(duplex) = &patch.duplex {
        body.insert("duplex".to_string(), json!(duplex));
    }
    if let Some(speed) = &patch.speed_kbps {
        body.insert("speed".to_string(), json!(speed));
    }
    Value::Object(body)
}
