//! API types for the daemon client.
//!
//! These types mirror the bodies served by virtbmcd.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// BMC Types
// =============================================================================

/// A persisted BMC config as returned by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmcRecord {
    /// Instance name.
    pub name: String,
    /// Driver tag.
    pub driver: String,
    /// IPMI username.
    pub username: String,
    /// IPMI password.
    pub password: String,
    /// UDP port.
    pub port: u16,
    /// Bind address.
    pub address: String,
    /// Whether the instance should be serving.
    #[serde(default)]
    pub active: bool,
    /// Driver-specific settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response for the config list.
#[derive(Debug, Deserialize)]
pub struct ListBmcsResponse {
    /// Every persisted config.
    pub bmcs: Vec<BmcRecord>,
}

/// Response for start and stop.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleResponse {
    /// Instance name.
    pub name: String,
    /// Whether the instance is now marked active.
    pub active: bool,
}

/// Response for the driver list.
#[derive(Debug, Deserialize)]
pub struct DriversResponse {
    /// Registered driver tags.
    pub drivers: Vec<String>,
}

// =============================================================================
// Error Types
// =============================================================================

/// Error body returned by the daemon.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// Error code and message.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}
