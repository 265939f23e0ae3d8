//! Daemon configuration types.

use std::path::PathBuf;
use std::time::Duration;

use virtbmc_control::ControlConfig;

/// Default listen address of the controller API.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:6230";
/// Default upper bound between stop checks of an idle serve loop (ms).
pub const DEFAULT_WAKE_INTERVAL_MS: u64 = 1000;
/// Default hard stop deadline (seconds).
pub const DEFAULT_STOP_GRACE_SECONDS: u64 = 5;
/// Default request timeout (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for the daemon process.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Listen address of the call boundary (e.g., "127.0.0.1:6230").
    pub listen_addr: String,

    /// Configuration location; resolved from the environment when unset.
    pub data_dir: Option<PathBuf>,

    /// Restart instances marked active when the daemon starts.
    pub autostart: bool,

    /// Upper bound between stop checks of an idle serve loop, in milliseconds.
    pub wake_interval_ms: u64,

    /// How long a stopping serve loop may take before it is aborted (seconds).
    pub stop_grace_seconds: u64,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl DaemonConfig {
    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Controller tuning derived from this configuration.
    #[must_use]
    pub const fn control_config(&self) -> ControlConfig {
        ControlConfig {
            wake_interval_ms: self.wake_interval_ms,
            stop_grace_seconds: self.stop_grace_seconds,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            data_dir: None,
            autostart: true,
            wake_interval_ms: DEFAULT_WAKE_INTERVAL_MS,
            stop_grace_seconds: DEFAULT_STOP_GRACE_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}
