//! An in-memory variant with no backing machine.
//!
//! Useful for exercising the management path end to end: power and boot
//! device commands only change local state. The Serial-over-LAN console
//! echoes whatever is typed on it.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use virtbmc_core::config::{reject_unknown, required_field};
use virtbmc_core::{
    BaseSettings, Bmc, BmcConfig, BootDevice, CompletionCode, CoreError, PowerState, RawConfig,
    Response, StopSignal,
};

/// Driver tag of this variant.
pub const DRIVER: &str = "dummy";

/// Sent back for a carriage return: cursor down one line, back 80 columns.
const NEWLINE_ECHO: &[u8] = b"\x1b[1B\x1b[80D";

/// A variant that keeps its power state and boot device in memory.
#[derive(Debug)]
pub struct DummyBmc {
    name: String,
    settings: BaseSettings,
    powered: AtomicBool,
    boot_device: Mutex<BootDevice>,
    console: AtomicBool,
    stop: StopSignal,
}

impl DummyBmc {
    /// Create a powered off instance.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: BaseSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            powered: AtomicBool::new(false),
            boot_device: Mutex::new(BootDevice::Default),
            console: AtomicBool::new(false),
            stop: StopSignal::new(),
        }
    }

    /// Build from a raw config.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing, mistyped or unknown keys.
    pub fn from_raw(raw: &RawConfig) -> Result<Self, CoreError> {
        let mut allowed = vec!["name"];
        allowed.extend_from_slice(BaseSettings::KEYS);
        reject_unknown(raw, &allowed)?;

        let name = required_field(raw, "name")?;
        Ok(Self::new(name, BaseSettings::from_raw(raw)?))
    }

    fn set_power(&self, on: bool) {
        self.powered.store(on, Ordering::SeqCst);
    }

    fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    /// Payload activation data: no auxiliary data, 1 byte payload sizes,
    /// the UDP port in network order, no VLAN.
    fn activation_data(&self) -> Vec<u8> {
        let [hi, lo] = self.settings.port.to_be_bytes();
        vec![0, 0, 0, 0, 1, 0, 1, 0, hi, lo, 0xff, 0xff]
    }
}

#[async_trait]
impl Bmc for DummyBmc {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> BmcConfig {
        self.settings.to_config(&self.name, DRIVER, RawConfig::new())
    }

    fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    async fn power_state(&self) -> Result<PowerState, CoreError> {
        Ok(PowerState::from(self.is_powered()))
    }

    async fn power_on(&self) -> CompletionCode {
        self.set_power(true);
        tracing::info!(bmc = %self.name, "Device powered on");
        CompletionCode::Success
    }

    async fn power_off(&self) -> CompletionCode {
        self.set_power(false);
        tracing::info!(bmc = %self.name, "Device powered off");
        CompletionCode::Success
    }

    async fn power_shutdown(&self) -> CompletionCode {
        tracing::info!(bmc = %self.name, "Device cleanly shut down");
        self.power_off().await
    }

    async fn power_reset(&self) -> CompletionCode {
        tracing::info!(bmc = %self.name, "Device power reset");
        CompletionCode::Success
    }

    async fn power_cycle(&self) -> CompletionCode {
        tracing::info!(bmc = %self.name, "Device power cycled");
        CompletionCode::Success
    }

    async fn boot_device(&self) -> Result<BootDevice, CoreError> {
        Ok(*self.boot_device.lock())
    }

    async fn set_boot_device(&self, device: BootDevice) -> CompletionCode {
        *self.boot_device.lock() = device;
        tracing::info!(bmc = %self.name, device = %device, "Boot device set");
        CompletionCode::Success
    }

    async fn activate_payload(&self, _data: &[u8]) -> Response {
        if !self.is_powered() {
            return Response::code(CompletionCode::PayloadDisabled);
        }
        if self.console.swap(true, Ordering::SeqCst) {
            return Response::code(CompletionCode::PayloadStateConflict);
        }
        tracing::info!(bmc = %self.name, "Console activated");
        Response::ok(self.activation_data())
    }

    async fn deactivate_payload(&self, _data: &[u8]) -> Response {
        if !self.console.swap(false, Ordering::SeqCst) {
            return Response::code(CompletionCode::PayloadStateConflict);
        }
        tracing::info!(bmc = %self.name, "Console deactivated");
        Response::code(CompletionCode::Success)
    }

    fn console_input(&self, data: &[u8]) -> Option<Vec<u8>> {
        if !self.console.load(Ordering::SeqCst) {
            return None;
        }
        tracing::debug!(bmc = %self.name, bytes = data.len(), "Console input");
        if data == b"\r" {
            Some(NEWLINE_ECHO.to_vec())
        } else {
            Some(data.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dummy() -> DummyBmc {
        DummyBmc::new("node-1", BaseSettings::default())
    }

    #[tokio::test]
    async fn starts_powered_off() {
        let bmc = dummy();
        assert_eq!(bmc.power_state().await.unwrap(), PowerState::Off);
        assert_eq!(bmc.boot_device().await.unwrap(), BootDevice::Default);
    }

    #[tokio::test]
    async fn power_on_then_shutdown() {
        let bmc = dummy();
        assert_eq!(bmc.power_on().await, CompletionCode::Success);
        assert_eq!(bmc.power_state().await.unwrap(), PowerState::On);

        assert_eq!(bmc.power_shutdown().await, CompletionCode::Success);
        assert_eq!(bmc.power_state().await.unwrap(), PowerState::Off);
    }

    #[tokio::test]
    async fn reset_and_cycle_keep_state() {
        let bmc = dummy();
        bmc.power_on().await;
        assert_eq!(bmc.power_reset().await, CompletionCode::Success);
        assert_eq!(bmc.power_cycle().await, CompletionCode::Success);
        assert_eq!(bmc.power_state().await.unwrap(), PowerState::On);
    }

    #[tokio::test]
    async fn boot_device_round_trip() {
        let bmc = dummy();
        assert_eq!(bmc.set_boot_device(BootDevice::Network).await, CompletionCode::Success);
        assert_eq!(bmc.boot_device().await.unwrap(), BootDevice::Network);
    }

    #[tokio::test]
    async fn cold_reset_stops_emulation() {
        let bmc = dummy();
        assert_eq!(bmc.cold_reset().await, CompletionCode::Success);
        assert!(bmc.stop_signal().is_triggered());
    }

    #[tokio::test]
    async fn console_needs_power() {
        let bmc = dummy();
        let response = bmc.activate_payload(&[0x01, 0x01]).await;
        assert_eq!(response.code, CompletionCode::PayloadDisabled);
        assert_eq!(bmc.console_input(b"x"), None);
    }

    #[tokio::test]
    async fn console_activation_carries_port() {
        let settings = BaseSettings {
            port: 0x1a2b,
            ..BaseSettings::default()
        };
        let bmc = DummyBmc::new("node-1", settings);
        bmc.power_on().await;

        let response = bmc.activate_payload(&[0x01, 0x01]).await;
        assert_eq!(response.code, CompletionCode::Success);
        assert_eq!(
            response.data,
            vec![0, 0, 0, 0, 1, 0, 1, 0, 0x1a, 0x2b, 0xff, 0xff]
        );

        let again = bmc.activate_payload(&[0x01, 0x01]).await;
        assert_eq!(again.code, CompletionCode::PayloadStateConflict);
    }

    #[tokio::test]
    async fn console_deactivation() {
        let bmc = dummy();
        let response = bmc.deactivate_payload(&[0x01, 0x01]).await;
        assert_eq!(response.code, CompletionCode::PayloadStateConflict);

        bmc.power_on().await;
        bmc.activate_payload(&[0x01, 0x01]).await;
        let response = bmc.deactivate_payload(&[0x01, 0x01]).await;
        assert_eq!(response, Response::code(CompletionCode::Success));
        assert_eq!(bmc.console_input(b"x"), None);
    }

    #[tokio::test]
    async fn console_echoes_input() {
        let bmc = dummy();
        bmc.power_on().await;
        bmc.activate_payload(&[]).await;

        assert_eq!(bmc.console_input(b"ls"), Some(b"ls".to_vec()));
        assert_eq!(bmc.console_input(b"\r"), Some(NEWLINE_ECHO.to_vec()));
    }

    #[tokio::test]
    async fn payload_commands_dispatch_to_console() {
        use virtbmc_core::protocol::{cmd, dispatch, netfn, Request};

        let bmc = dummy();
        bmc.power_on().await;

        let activate = Request::new(netfn::APP, cmd::ACTIVATE_PAYLOAD, [0x01, 0x01]);
        let deactivate = Request::new(netfn::APP, cmd::DEACTIVATE_PAYLOAD, [0x01, 0x01]);
        assert!(dispatch(&bmc, &activate).await.code.is_success());
        assert_eq!(dispatch(&bmc, &activate).await.code.as_u8(), 0x80);
        assert!(dispatch(&bmc, &deactivate).await.code.is_success());
        assert_eq!(dispatch(&bmc, &deactivate).await.code.as_u8(), 0x80);
    }

    #[test]
    fn from_raw_rejects_unknown_keys() {
        let raw = match json!({"name": "a", "cloud": "devstack"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let err = DummyBmc::from_raw(&raw).unwrap_err();
        assert!(err.to_string().contains("cloud"));
    }

    #[test]
    fn config_has_no_extra_fields() {
        let config = dummy().config();
        assert_eq!(config.driver, "dummy");
        assert!(config.extra.is_empty());
    }
}
