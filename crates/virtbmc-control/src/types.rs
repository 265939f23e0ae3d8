//! Configuration and report types for the controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use virtbmc_core::ServeOptions;

/// Tuning for the controller and its pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Upper bound, in milliseconds, between stop checks of an idle serve loop.
    #[serde(default = "ControlConfig::default_wake_interval_ms")]
    pub wake_interval_ms: u64,
    /// How long `stop` waits for a serve loop before aborting it (seconds).
    #[serde(default = "ControlConfig::default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
}

impl ControlConfig {
    const fn default_wake_interval_ms() -> u64 {
        1000
    }

    const fn default_stop_grace_seconds() -> u64 {
        5
    }

    /// Options handed to every serve loop.
    #[must_use]
    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            wake_interval: Duration::from_millis(self.wake_interval_ms),
        }
    }

    /// Hard deadline for a stopping serve loop.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            wake_interval_ms: Self::default_wake_interval_ms(),
            stop_grace_seconds: Self::default_stop_grace_seconds(),
        }
    }
}

/// Outcome of restarting the instances marked active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Names now serving.
    pub recovered: Vec<String>,
    /// Names that could not be restarted.
    pub failed: Vec<RecoveryFailure>,
}

impl RecoveryReport {
    /// Whether every active instance came back.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One instance that failed to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryFailure {
    /// Instance name.
    pub name: String,
    /// Why it failed.
    pub reason: String,
}
