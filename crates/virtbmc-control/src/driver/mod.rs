//! Variant registration and construction.
//!
//! Drivers are registered explicitly when the registry is built; there is
//! no runtime discovery. [`DriverRegistry::make_bmc`] turns a raw config
//! into a live variant, which is also how a config gets validated and
//! canonicalized before it is persisted.

pub mod dummy;

use std::collections::BTreeMap;
use std::sync::Arc;

use virtbmc_core::config::{required_field, validate_name, TRANSIENT_KEYS};
use virtbmc_core::{Bmc, RawConfig};
use virtbmc_openstack::OpenStackBmc;

use crate::error::{ControlError, Result};

pub use dummy::DummyBmc;

/// Builds a variant from a raw config stripped of `driver` and transient keys.
pub type Factory = fn(&RawConfig) -> virtbmc_core::Result<Arc<dyn Bmc>>;

/// The driver tag to factory table.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, Factory>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

impl DriverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every driver shipped with virtbmc.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(dummy::DRIVER, |raw| {
            Ok(Arc::new(DummyBmc::from_raw(raw)?) as Arc<dyn Bmc>)
        });
        registry.register(virtbmc_openstack::DRIVER, |raw| {
            Ok(Arc::new(OpenStackBmc::from_raw(raw)?) as Arc<dyn Bmc>)
        });
        registry
    }

    /// Register or replace a driver.
    pub fn register(&mut self, driver: impl Into<String>, factory: Factory) {
        self.factories.insert(driver.into(), factory);
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn drivers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Whether a tag is registered.
    #[must_use]
    pub fn contains(&self, driver: &str) -> bool {
        self.factories.contains_key(driver)
    }

    /// Build a variant from a raw config.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidConfig` if `name` or `driver` is missing
    /// or the variant rejects the config, and `ControlError::UnknownDriver`
    /// if the tag is not registered.
    pub fn make_bmc(&self, raw: &RawConfig) -> Result<Arc<dyn Bmc>> {
        let (_, driver) = required_keys(raw)?;

        let factory = self
            .factories
            .get(&driver)
            .ok_or_else(|| ControlError::UnknownDriver {
                driver: driver.clone(),
                available: self.drivers(),
            })?;

        let mut config = raw.clone();
        config.remove("driver");
        for key in TRANSIENT_KEYS {
            config.remove(*key);
        }

        let bmc = factory(&config)?;
        tracing::debug!(name = %bmc.name(), driver = %driver, "Built bmc variant");
        Ok(bmc)
    }
}

/// Extract and check the `name` and `driver` every config must carry.
///
/// # Errors
///
/// Returns `ControlError::InvalidConfig` if either is missing or the name
/// cannot be used as a record key.
pub fn required_keys(raw: &RawConfig) -> Result<(String, String)> {
    let name = required_field(raw, "name")?;
    validate_name(&name)?;
    let driver = required_field(raw, "driver")?;
    Ok((name, driver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawConfig {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn builtin_drivers() {
        let registry = DriverRegistry::builtin();
        assert_eq!(registry.drivers(), vec!["dummy", "openstack"]);
        assert!(registry.contains("dummy"));
        assert!(!registry.contains("vmware"));
    }

    #[test]
    fn make_dummy_canonicalizes() {
        let registry = DriverRegistry::builtin();
        let bmc = registry
            .make_bmc(&raw(json!({"name": "a", "driver": "dummy", "port": "6230"})))
            .unwrap();

        let config = bmc.config();
        assert_eq!(config.name, "a");
        assert_eq!(config.driver, "dummy");
        assert_eq!(config.port, 6230);
        assert_eq!(config.username, "admin");
        assert!(!config.active);
    }

    #[test]
    fn active_flag_is_stripped() {
        let registry = DriverRegistry::builtin();
        let bmc = registry
            .make_bmc(&raw(json!({"name": "a", "driver": "dummy", "active": true})))
            .unwrap();
        assert!(!bmc.config().active);
    }

    #[test]
    fn missing_keys_are_rejected() {
        let registry = DriverRegistry::builtin();

        let err = registry.make_bmc(&raw(json!({"driver": "dummy"}))).err().expect("expected error");
        assert_eq!(err.to_string(), "invalid bmc config missing required: 'name' key");

        let err = registry.make_bmc(&raw(json!({"name": "a"}))).err().expect("expected error");
        assert_eq!(err.to_string(), "invalid bmc config missing required: 'driver' key");
    }

    #[test]
    fn unknown_driver_lists_available() {
        let registry = DriverRegistry::builtin();
        let err = registry
            .make_bmc(&raw(json!({"name": "a", "driver": "vmware"})))
            .err().expect("expected error");

        match err {
            ControlError::UnknownDriver { driver, available } => {
                assert_eq!(driver, "vmware");
                assert_eq!(available, vec!["dummy", "openstack"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn variant_validation_surfaces() {
        let registry = DriverRegistry::builtin();
        let err = registry
            .make_bmc(&raw(json!({"name": "a", "driver": "dummy", "port": 70000})))
            .err().expect("expected error");
        assert!(matches!(err, ControlError::InvalidConfig(_)));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let registry = DriverRegistry::builtin();
        let err = registry
            .make_bmc(&raw(json!({"name": "../etc", "driver": "dummy"})))
            .err().expect("expected error");
        assert!(matches!(err, ControlError::InvalidConfig(_)));
    }
}
