//! Compute resource views.
//!
//! A [`ServerView`] is fetched fresh for every query and never cached.

use serde::{Deserialize, Serialize};

/// Nova server status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Running.
    Active,
    /// Being created.
    Build,
    /// Deleted.
    Deleted,
    /// Failed.
    Error,
    /// Hard reboot in progress.
    HardReboot,
    /// Live migration in progress.
    Migrating,
    /// Password reset in progress.
    Password,
    /// Paused.
    Paused,
    /// Soft reboot in progress.
    Reboot,
    /// Rebuild in progress.
    Rebuild,
    /// In rescue mode.
    Rescue,
    /// Resize in progress.
    Resize,
    /// Resize being reverted.
    RevertResize,
    /// Shelved.
    Shelved,
    /// Shelved and removed from its host.
    ShelvedOffloaded,
    /// Powered off.
    Shutoff,
    /// Soft deleted.
    SoftDeleted,
    /// Suspended.
    Suspended,
    /// Resize awaiting confirmation.
    VerifyResize,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// The state triple of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerView {
    /// Server UUID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Coarse status.
    pub status: ServerStatus,
    /// Settled lifecycle state, e.g. `active` or `stopped`.
    #[serde(rename = "OS-EXT-STS:vm_state", default)]
    pub vm_state: Option<String>,
    /// In-flight operation, e.g. `powering-on`.
    #[serde(rename = "OS-EXT-STS:task_state", default)]
    pub task_state: Option<String>,
}

impl ServerView {
    /// Build a view, mainly for tests.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        status: ServerStatus,
        vm_state: Option<&str>,
        task_state: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            vm_state: vm_state.map(str::to_string),
            task_state: task_state.map(str::to_string),
        }
    }
}

/// Kind of reboot requested from Nova.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RebootType {
    /// Graceful, through the guest.
    Soft,
    /// Power cycle.
    Hard,
}

impl RebootType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_nova_server() {
        let server: ServerView = serde_json::from_value(json!({
            "id": "9168b536",
            "name": "node-1",
            "status": "SHUTOFF",
            "OS-EXT-STS:vm_state": "stopped",
            "OS-EXT-STS:task_state": "powering-on",
            "flavor": {"id": "1"}
        }))
        .unwrap();

        assert_eq!(server.status, ServerStatus::Shutoff);
        assert_eq!(server.vm_state.as_deref(), Some("stopped"));
        assert_eq!(server.task_state.as_deref(), Some("powering-on"));
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let server: ServerView = serde_json::from_value(json!({
            "id": "1",
            "name": "n",
            "status": "SOMETHING_NEW",
            "OS-EXT-STS:task_state": null
        }))
        .unwrap();

        assert_eq!(server.status, ServerStatus::Unknown);
        assert_eq!(server.task_state, None);
        assert_eq!(server.vm_state, None);
    }

    #[test]
    fn reboot_type_wire_names() {
        assert_eq!(serde_json::to_value(RebootType::Hard).unwrap(), json!("HARD"));
        assert_eq!(RebootType::Soft.as_str(), "SOFT");
    }
}
