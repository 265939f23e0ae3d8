//! The BMC variant interface.
//!
//! A variant is the thing a management client talks to: it knows how to
//! report and change the power state and boot device of one machine. The
//! serve loop in [`crate::server`] owns the socket and calls into the variant
//! for every decoded request.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::codes::{BootDevice, CompletionCode, PowerState};
use crate::config::BmcConfig;
use crate::error::Result;
use crate::protocol::Response;

/// A latch that tells a serve loop to return.
///
/// Triggering is idempotent. The loop selects on [`StopSignal::subscribe`]
/// alongside its socket, so it observes a stop as soon as it is sent
/// rather than at the next poll.
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Ask the loop to stop. Returns false if it had already been asked.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Whether a stop has been requested since the last re-arm.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear the latch so the variant can be served again.
    pub fn rearm(&self) {
        self.tx.send_replace(false);
    }

    /// Watch the latch.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// A concrete BMC variant.
///
/// Power commands return a [`CompletionCode`] rather than an error: backend
/// trouble is folded into the result vocabulary before it reaches the wire.
#[async_trait]
pub trait Bmc: Send + Sync {
    /// The driver tag this variant is registered under.
    fn driver(&self) -> &'static str;

    /// Instance name.
    fn name(&self) -> &str;

    /// Canonical configuration with defaults filled in and the driver tag set.
    fn config(&self) -> BmcConfig;

    /// The latch that ends this variant's serve loop.
    fn stop_signal(&self) -> &StopSignal;

    /// Signal the serve loop to return.
    fn stop(&self) {
        if self.stop_signal().trigger() {
            tracing::debug!(bmc = %self.name(), "Stop requested");
        }
    }

    /// Called once by the serve loop before it accepts requests.
    ///
    /// # Errors
    ///
    /// An error aborts the serve loop.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Current chassis power state.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the state cannot be determined.
    async fn power_state(&self) -> Result<PowerState>;

    /// Power up the machine.
    async fn power_on(&self) -> CompletionCode;

    /// Hard power off.
    async fn power_off(&self) -> CompletionCode;

    /// Graceful shutdown. Defaults to a hard power off.
    async fn power_shutdown(&self) -> CompletionCode {
        self.power_off().await
    }

    /// Warm reset.
    async fn power_reset(&self) -> CompletionCode;

    /// Power off then on.
    async fn power_cycle(&self) -> CompletionCode;

    /// Current boot device override.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the setting cannot be read.
    async fn boot_device(&self) -> Result<BootDevice>;

    /// Set the boot device override.
    async fn set_boot_device(&self, device: BootDevice) -> CompletionCode;

    /// Reset the management controller itself, which tears down the
    /// local emulation rather than touching the machine.
    async fn cold_reset(&self) -> CompletionCode {
        tracing::info!(bmc = %self.name(), "Cold reset, stopping bmc");
        self.stop();
        CompletionCode::Success
    }

    /// Activate the Serial-over-LAN payload.
    ///
    /// Variants without a console answer `InvalidCommand`.
    async fn activate_payload(&self, _data: &[u8]) -> Response {
        Response::code(CompletionCode::InvalidCommand)
    }

    /// Deactivate the Serial-over-LAN payload.
    async fn deactivate_payload(&self, _data: &[u8]) -> Response {
        Response::code(CompletionCode::InvalidCommand)
    }

    /// Feed bytes typed on the console.
    ///
    /// Returns the bytes to write back to the console, or `None` when no
    /// console is active.
    fn console_input(&self, _data: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_trigger_is_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());

        signal.rearm();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
    }

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let signal = StopSignal::new();
        let mut rx = signal.subscribe();
        assert!(!*rx.borrow_and_update());

        signal.trigger();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
