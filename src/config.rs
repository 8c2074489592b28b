//! Configuration for the sync agent

use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};

/// Connection settings for the NetBox API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetboxConfig {
    /// NetBox base URL (e.g. "https://netbox.example.com")
    pub base_url: String,

    /// API token for authentication
    pub api_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl NetboxConfig {
    /// Load from `NETBOX_URL`, `NETBOX_API_TOKEN` and `NETBOX_TIMEOUT`
    pub fn from_env() -> SyncResult<Self> {
        let base_url = std::env::var("NETBOX_URL")
            .map_err(|_| SyncError::Configuration("NETBOX_URL not set".to_string()))?;
        let api_token = std::env::var("NETBOX_API_TOKEN")
            .map_err(|_| SyncError::Configuration("NETBOX_API_TOKEN not set".to_string()))?;
        let timeout_secs = match std::env::var("NETBOX_TIMEOUT") {
            Ok(raw) => raw.parse().map_err(|_| {
                SyncError::Configuration(format!("NETBOX_TIMEOUT is not a number: {raw}"))
            })?,
            Err(_) => default_timeout(),
        };

        Ok(Self {
            base_url,
            api_token,
            timeout_secs,
        })
    }
}

/// Which local attribute identifies an interface across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NicIdentifier {
    /// Match remote interfaces by name (default)
    Name,
    /// Match remote interfaces by MAC; survives interface renames
    Mac,
}

impl Default for NicIdentifier {
    fn default() -> Self {
        NicIdentifier::Name
    }
}

/// Engine behavior switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device name this host maps to in NetBox
    pub device: String,

    #[serde(default)]
    pub nic_identifier: NicIdentifier,
}

impl SyncConfig {
    /// Load from `NETBOX_DEVICE` and `NETBOX_NIC_ID`
    pub fn from_env() -> SyncResult<Self> {
        let device = std::env::var("NETBOX_DEVICE")
            .map_err(|_| SyncError::Configuration("NETBOX_DEVICE not set".to_string()))?;

        let nic_identifier = match std::env::var("NETBOX_NIC_ID").as_deref() {
            Ok("mac") => NicIdentifier::Mac,
            Ok("name") | Err(_) => NicIdentifier::Name,
            Ok(other) => {
                return Err(SyncError::Configuration(format!(
                    "NETBOX_NIC_ID must be 'name' or 'mac', got '{other}'"
                )))
            }
        };

        Ok(Self {
            device,
            nic_identifier,
        })
    }
}
