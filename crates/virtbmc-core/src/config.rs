//! Instance configuration records.
//!
//! A [`BmcConfig`] is the canonical, persisted form of one managed instance.
//! Variants are built from a loosely typed [`RawConfig`] so that each driver
//! can validate its own extra fields; [`BaseSettings`] parses the fields
//! every driver shares and fills in their defaults.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// An untyped configuration map as received from a caller or read from disk.
pub type RawConfig = serde_json::Map<String, Value>;

/// Default login accepted by a new instance.
pub const DEFAULT_USERNAME: &str = "admin";
/// Default password accepted by a new instance.
pub const DEFAULT_PASSWORD: &str = "password";
/// Standard IPMI-over-LAN port.
pub const DEFAULT_PORT: u16 = 623;
/// Listen on every interface, IPv4 and IPv6.
pub const DEFAULT_ADDRESS: &str = "::";

/// Keys that never reach a variant constructor.
pub const TRANSIENT_KEYS: &[&str] = &["active"];

/// The persisted configuration of one managed instance.
///
/// Driver specific fields are carried in `extra` and flattened into the
/// same JSON object on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmcConfig {
    /// Unique instance name.
    pub name: String,
    /// Registered driver tag.
    pub driver: String,
    /// Login accepted by the management endpoint.
    #[serde(default = "BmcConfig::default_username")]
    pub username: String,
    /// Password accepted by the management endpoint.
    #[serde(default = "BmcConfig::default_password")]
    pub password: String,
    /// Listening port.
    #[serde(default = "BmcConfig::default_port")]
    pub port: u16,
    /// Listening address.
    #[serde(default = "BmcConfig::default_address")]
    pub address: IpAddr,
    /// Whether the instance should be running.
    #[serde(default)]
    pub active: bool,
    /// Driver specific fields.
    #[serde(flatten)]
    pub extra: RawConfig,
}

impl BmcConfig {
    fn default_username() -> String {
        DEFAULT_USERNAME.to_string()
    }

    fn default_password() -> String {
        DEFAULT_PASSWORD.to_string()
    }

    const fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_address() -> IpAddr {
        IpAddr::from([0u16; 8])
    }

    /// Convert to an untyped map, the form variant constructors consume.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidField` if the record does not serialize to an object.
    pub fn to_raw(&self) -> Result<RawConfig> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::InvalidField {
                field: "config".into(),
                reason: "expected a JSON object".into(),
            }),
            Err(e) => Err(CoreError::InvalidField {
                field: "config".into(),
                reason: e.to_string(),
            }),
        }
    }

    /// Parse a record from an untyped map.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidField` if required fields are missing or mistyped.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        serde_json::from_value(Value::Object(raw)).map_err(|e| CoreError::InvalidField {
            field: "config".into(),
            reason: e.to_string(),
        })
    }
}

/// Connection settings shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSettings {
    /// Login accepted by the management endpoint.
    pub username: String,
    /// Password accepted by the management endpoint.
    pub password: String,
    /// Listening port.
    pub port: u16,
    /// Listening address.
    pub address: IpAddr,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            port: DEFAULT_PORT,
            address: BmcConfig::default_address(),
        }
    }
}

impl BaseSettings {
    /// Keys this type consumes from a raw config.
    pub const KEYS: &'static [&'static str] = &["username", "password", "port", "address"];

    /// Parse and normalize the shared settings, applying defaults for absent keys.
    ///
    /// The port may be given as a number or a numeric string. The address is
    /// normalized through [`IpAddr`], so `"0:0::0"` is stored as `"::"`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidPort` or `CoreError::InvalidAddress` for
    /// out of range or malformed values.
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        let defaults = Self::default();

        let username = string_field(raw, "username")?.unwrap_or(defaults.username);
        let password = string_field(raw, "password")?.unwrap_or(defaults.password);
        let port = match raw.get("port") {
            None | Some(Value::Null) => defaults.port,
            Some(value) => parse_port(value)?,
        };
        let address = match raw.get("address") {
            None | Some(Value::Null) => defaults.address,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| CoreError::InvalidAddress(s.clone()))?,
            Some(other) => return Err(CoreError::InvalidAddress(other.to_string())),
        };

        Ok(Self {
            username,
            password,
            port,
            address,
        })
    }

    /// Build the canonical record for a variant using these settings.
    #[must_use]
    pub fn to_config(&self, name: &str, driver: &str, extra: RawConfig) -> BmcConfig {
        BmcConfig {
            name: name.to_string(),
            driver: driver.to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            address: self.address,
            active: false,
            extra,
        }
    }
}

fn parse_port(value: &Value) -> Result<u16> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| CoreError::InvalidPort(value.to_string()))
}

/// Read an optional string field.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` if the key holds a non-string value.
pub fn string_field(raw: &RawConfig, key: &str) -> Result<Option<String>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CoreError::InvalidField {
            field: key.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Read a required, non-empty string field.
///
/// # Errors
///
/// Returns `CoreError::MissingField` if the key is absent, null or empty.
pub fn required_field(raw: &RawConfig, key: &str) -> Result<String> {
    match string_field(raw, key)? {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(CoreError::MissingField(key.to_string())),
    }
}

/// Check that an instance name can be used as a record key.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` for names containing path separators
/// or consisting only of dots.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.chars().all(|c| c == '.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(CoreError::InvalidField {
            field: "name".into(),
            reason: format!("'{name}' cannot be used as an instance name"),
        });
    }
    Ok(())
}

/// Reject keys a variant does not understand.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` naming the first unexpected key.
pub fn reject_unknown(raw: &RawConfig, allowed: &[&str]) -> Result<()> {
    if let Some(key) = raw.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(CoreError::InvalidField {
            field: key.clone(),
            reason: format!("unexpected key, expected one of {allowed:?}"),
        });
    }
    Ok(())
}
