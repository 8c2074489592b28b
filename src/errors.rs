//! Error types for NetBox synchronization

use thiserror::Error;

/// Errors that abort the current run.
///
/// Per-component conditions (missing identity attributes, module-type
/// catalog misses, exhausted bays, unresolvable LLDP peers) are not errors
/// at this level: the engine logs them, records them in the run report and
/// keeps going. Only transport-level failures and malformed responses from
/// NetBox surface here; a subsequent run is expected to self-heal.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection-level failure talking to NetBox
    #[error("NetBox transport error: {0}")]
    Transport(String),

    /// NetBox answered with a non-success status
    #[error("NetBox API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Serialization error building a request body
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The device this host maps to does not exist in NetBox
    #[error("Device {0} not found in NetBox")]
    DeviceNotFound(String),
}

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Deserialization(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}
