//! The OpenStack BMC variant.
//!
//! One `OpenStackBmc` fronts one Nova server, located by name or UUID when
//! the serve loop prepares. Power state is re-read from Nova on every query.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use virtbmc_core::config::{reject_unknown, required_field, string_field};
use virtbmc_core::{
    BaseSettings, Bmc, BmcConfig, BootDevice, CompletionCode, CoreError, PowerState, RawConfig,
    StopSignal,
};

use crate::compute::ComputeApi;
use crate::error::ComputeError;
use crate::nova::NovaClient;
use crate::translate;
use crate::types::RebootType;

/// Driver tag of this variant.
pub const DRIVER: &str = "openstack";

/// Server metadata flag that makes libvirt try PXE before the disk.
pub const PXE_FIRST_KEY: &str = "libvirt:pxe-first";

/// An IPMI endpoint backed by a Nova server.
pub struct OpenStackBmc {
    name: String,
    cloud: Option<String>,
    settings: BaseSettings,
    compute: Arc<dyn ComputeApi>,
    server_id: RwLock<Option<String>>,
    stop: StopSignal,
}

impl std::fmt::Debug for OpenStackBmc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackBmc")
            .field("name", &self.name)
            .field("cloud", &self.cloud)
            .field("settings", &self.settings)
            .field("server_id", &*self.server_id.read())
            .finish_non_exhaustive()
    }
}

impl OpenStackBmc {
    /// Keys accepted in a raw config, besides the shared settings.
    const KEYS: &'static [&'static str] = &["name", "cloud"];

    /// Create a variant talking to Nova with credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the HTTP client cannot be created.
    pub fn new(
        name: impl Into<String>,
        cloud: Option<String>,
        settings: BaseSettings,
    ) -> Result<Self, CoreError> {
        let compute =
            NovaClient::from_env(cloud.clone()).map_err(|e| CoreError::Backend(e.to_string()))?;
        Ok(Self::with_compute(name, cloud, settings, Arc::new(compute)))
    }

    /// Create a variant over an arbitrary compute backend.
    #[must_use]
    pub fn with_compute(
        name: impl Into<String>,
        cloud: Option<String>,
        settings: BaseSettings,
        compute: Arc<dyn ComputeApi>,
    ) -> Self {
        Self {
            name: name.into(),
            cloud,
            settings,
            compute,
            server_id: RwLock::new(None),
            stop: StopSignal::new(),
        }
    }

    /// Build from a raw config.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing, mistyped or unknown keys.
    pub fn from_raw(raw: &RawConfig) -> Result<Self, CoreError> {
        let allowed: Vec<&str> = Self::KEYS
            .iter()
            .chain(BaseSettings::KEYS)
            .copied()
            .collect();
        reject_unknown(raw, &allowed)?;

        let name = required_field(raw, "name")?;
        let cloud = string_field(raw, "cloud")?;
        let settings = BaseSettings::from_raw(raw)?;
        Self::new(name, cloud, settings)
    }

    /// The named cloud, if any.
    #[must_use]
    pub fn cloud(&self) -> Option<&str> {
        self.cloud.as_deref()
    }

    /// The UUID of the server once located.
    #[must_use]
    pub fn server_id(&self) -> Option<String> {
        self.server_id.read().clone()
    }

    fn require_server(&self) -> Option<String> {
        let id = self.server_id();
        if id.is_none() {
            tracing::warn!(bmc = %self.name, "No server located yet, rejecting command");
        }
        id
    }

    async fn power_action(&self, action: PowerAction) -> CompletionCode {
        let Some(id) = self.require_server() else {
            return CompletionCode::CommandNotSupportedInPresentState;
        };

        tracing::debug!(bmc = %self.name, server_id = %id, action = ?action, "Power action");
        let compute = self.compute.as_ref();
        let (result, accepts) = match action {
            PowerAction::On => (compute.start_server(&id).await, translate::POWER_ON_ACCEPTS),
            PowerAction::Off => (compute.stop_server(&id).await, translate::POWER_OFF_ACCEPTS),
            PowerAction::Reset => (
                compute.reboot_server(&id, RebootType::Soft).await,
                translate::POWER_RESET_ACCEPTS,
            ),
            PowerAction::Cycle => (
                compute.reboot_server(&id, RebootType::Hard).await,
                translate::POWER_CYCLE_ACCEPTS,
            ),
        };
        translate::action_result(result, accepts)
    }
}

#[derive(Debug, Clone, Copy)]
enum PowerAction {
    On,
    Off,
    Reset,
    Cycle,
}

#[async_trait]
impl Bmc for OpenStackBmc {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> BmcConfig {
        let mut extra = RawConfig::new();
        extra.insert(
            "cloud".into(),
            self.cloud.clone().map_or(Value::Null, Value::String),
        );
        self.settings.to_config(&self.name, DRIVER, extra)
    }

    fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    async fn prepare(&self) -> Result<(), CoreError> {
        match self.compute.find_server(&self.name).await {
            Ok(Some(server)) => {
                tracing::info!(
                    bmc = %self.name,
                    server_id = %server.id,
                    cloud = ?self.cloud,
                    "Connected to cloud server"
                );
                *self.server_id.write() = Some(server.id);
                Ok(())
            }
            Ok(None) => {
                tracing::error!(bmc = %self.name, "Server not found in the cloud, stopping bmc");
                self.stop();
                Err(CoreError::Backend(format!(
                    "server {} not found in the cloud",
                    self.name
                )))
            }
            Err(e) => {
                tracing::error!(bmc = %self.name, error = %e, "Failed to look up server, stopping bmc");
                self.stop();
                Err(CoreError::Backend(e.to_string()))
            }
        }
    }

    async fn power_state(&self) -> Result<PowerState, CoreError> {
        let id = self
            .require_server()
            .ok_or_else(|| CoreError::Backend("no server located".into()))?;

        match self.compute.get_server(&id).await {
            Ok(Some(server)) => {
                tracing::debug!(
                    bmc = %self.name,
                    status = ?server.status,
                    vm_state = ?server.vm_state,
                    task_state = ?server.task_state,
                    "Refreshed server status"
                );
                Ok(PowerState::from(translate::is_active(&server)))
            }
            Ok(None) => {
                tracing::error!(bmc = %self.name, "Server stopped existing, stopping bmc");
                self.stop();
                Ok(PowerState::Off)
            }
            Err(e) => Err(CoreError::Backend(e.to_string())),
        }
    }

    async fn power_on(&self) -> CompletionCode {
        self.power_action(PowerAction::On).await
    }

    async fn power_off(&self) -> CompletionCode {
        self.power_action(PowerAction::Off).await
    }

    async fn power_reset(&self) -> CompletionCode {
        self.power_action(PowerAction::Reset).await
    }

    async fn power_cycle(&self) -> CompletionCode {
        self.power_action(PowerAction::Cycle).await
    }

    async fn boot_device(&self) -> Result<BootDevice, CoreError> {
        let id = self
            .require_server()
            .ok_or_else(|| CoreError::Backend("no server located".into()))?;

        match self.compute.get_metadata_item(&id, PXE_FIRST_KEY).await {
            Ok(Some(flag)) if flag == "1" => Ok(BootDevice::Network),
            Ok(_) | Err(ComputeError::NotFound(_)) => Ok(BootDevice::Hd),
            Err(e) => Err(CoreError::Backend(e.to_string())),
        }
    }

    async fn set_boot_device(&self, device: BootDevice) -> CompletionCode {
        let flag = match device {
            BootDevice::Hd => "",
            BootDevice::Network => "1",
            other => {
                tracing::error!(bmc = %self.name, device = %other, "Unsupported boot device, skipping command");
                return CompletionCode::Success;
            }
        };
        let Some(id) = self.require_server() else {
            return CompletionCode::CommandNotSupportedInPresentState;
        };

        match self.compute.set_metadata_item(&id, PXE_FIRST_KEY, flag).await {
            Ok(()) => {
                tracing::info!(bmc = %self.name, device = %device, "Boot device set");
                CompletionCode::Success
            }
            Err(e) => {
                tracing::error!(bmc = %self.name, error = %e, "Failed to set boot device");
                CompletionCode::UnspecifiedError
            }
        }
    }
}
