//! The compute backend interface.
//!
//! This trait abstracts the handful of Nova calls the variant needs,
//! allowing for mock implementations in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RebootType, ServerView};

/// Compute backend operations used by [`crate::OpenStackBmc`].
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Find a server by UUID or exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    async fn find_server(&self, name_or_id: &str) -> Result<Option<ServerView>>;

    /// Fetch the current state of a server.
    ///
    /// Returns `None` if the server no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    async fn get_server(&self, server_id: &str) -> Result<Option<ServerView>>;

    /// Power on.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Conflict` if the server is in a state that
    /// doesn't allow starting.
    async fn start_server(&self, server_id: &str) -> Result<()>;

    /// Power off.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Conflict` if the server is in a state that
    /// doesn't allow stopping.
    async fn stop_server(&self, server_id: &str) -> Result<()>;

    /// Reboot.
    ///
    /// # Errors
    ///
    /// Returns `ComputeError::Conflict` if the server is in a state that
    /// doesn't allow rebooting.
    async fn reboot_server(&self, server_id: &str, kind: RebootType) -> Result<()>;

    /// Read one metadata item, `None` if unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    async fn get_metadata_item(&self, server_id: &str, key: &str) -> Result<Option<String>>;

    /// Write one metadata item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    async fn set_metadata_item(&self, server_id: &str, key: &str, value: &str) -> Result<()>;
}

/// An in-memory compute backend for testing without a cloud.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::error::ComputeError;
    use crate::types::ServerStatus;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A mock compute backend that keeps servers in memory.
    ///
    /// Actions only succeed from the settled state Nova accepts them in;
    /// otherwise they fail with the same conflict message Nova returns.
    #[derive(Default)]
    pub struct MockCompute {
        servers: Mutex<HashMap<String, MockServer>>,
    }

    struct MockServer {
        view: ServerView,
        metadata: HashMap<String, String>,
        actions: Vec<String>,
    }

    impl MockCompute {
        /// Create an empty mock backend.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a backend holding one server.
        #[must_use]
        pub fn with_server(view: ServerView) -> Self {
            let mock = Self::new();
            mock.insert(view);
            mock
        }

        /// Add or replace a server.
        pub fn insert(&self, view: ServerView) {
            self.servers.lock().insert(
                view.id.clone(),
                MockServer {
                    view,
                    metadata: HashMap::new(),
                    actions: Vec::new(),
                },
            );
        }

        /// Remove a server, as if it had been deleted out of band.
        pub fn remove(&self, server_id: &str) {
            self.servers.lock().remove(server_id);
        }

        /// Overwrite the state triple of a server.
        pub fn set_state(
            &self,
            server_id: &str,
            status: ServerStatus,
            vm_state: Option<&str>,
            task_state: Option<&str>,
        ) {
            if let Some(server) = self.servers.lock().get_mut(server_id) {
                server.view.status = status;
                server.view.vm_state = vm_state.map(str::to_string);
                server.view.task_state = task_state.map(str::to_string);
            }
        }

        /// Current view of a server.
        #[must_use]
        pub fn server(&self, server_id: &str) -> Option<ServerView> {
            self.servers.lock().get(server_id).map(|s| s.view.clone())
        }

        /// A metadata item of a server.
        #[must_use]
        pub fn metadata(&self, server_id: &str, key: &str) -> Option<String> {
            self.servers
                .lock()
                .get(server_id)
                .and_then(|s| s.metadata.get(key).cloned())
        }

        /// Actions accepted so far, oldest first.
        #[must_use]
        pub fn actions(&self, server_id: &str) -> Vec<String> {
            self.servers
                .lock()
                .get(server_id)
                .map(|s| s.actions.clone())
                .unwrap_or_default()
        }

        fn act(
            &self,
            server_id: &str,
            verb: &str,
            from: ServerStatus,
            to: Option<(ServerStatus, &str)>,
        ) -> Result<()> {
            let mut servers = self.servers.lock();
            let server = servers
                .get_mut(server_id)
                .ok_or_else(|| ComputeError::NotFound(format!("server {server_id}")))?;

            let view = &mut server.view;
            if view.status != from || view.task_state.is_some() {
                return Err(ComputeError::Conflict {
                    message: conflict_message(view, verb),
                });
            }

            if let Some((status, vm_state)) = to {
                view.status = status;
                view.vm_state = Some(vm_state.to_string());
            }
            server.actions.push(verb.to_string());
            Ok(())
        }
    }

    fn conflict_message(view: &ServerView, verb: &str) -> String {
        let (field, value) = match &view.task_state {
            Some(task) => ("task_state", task.as_str()),
            None => ("vm_state", view.vm_state.as_deref().unwrap_or("")),
        };
        format!(
            "Client Error for url: /v2.1/servers/{id}/action, \
             Cannot '{verb}' instance {id} while it is in {field} {value}",
            id = view.id
        )
    }

    #[async_trait]
    impl ComputeApi for MockCompute {
        async fn find_server(&self, name_or_id: &str) -> Result<Option<ServerView>> {
            let servers = self.servers.lock();
            Ok(servers
                .get(name_or_id)
                .or_else(|| servers.values().find(|s| s.view.name == name_or_id))
                .map(|s| s.view.clone()))
        }

        async fn get_server(&self, server_id: &str) -> Result<Option<ServerView>> {
            Ok(self.server(server_id))
        }

        async fn start_server(&self, server_id: &str) -> Result<()> {
            self.act(
                server_id,
                "start",
                ServerStatus::Shutoff,
                Some((ServerStatus::Active, "active")),
            )
        }

        async fn stop_server(&self, server_id: &str) -> Result<()> {
            self.act(
                server_id,
                "stop",
                ServerStatus::Active,
                Some((ServerStatus::Shutoff, "stopped")),
            )
        }

        async fn reboot_server(&self, server_id: &str, kind: RebootType) -> Result<()> {
            let verb = match kind {
                RebootType::Soft => "reboot",
                RebootType::Hard => "reboot_hard",
            };
            self.act(server_id, verb, ServerStatus::Active, None)
        }

        async fn get_metadata_item(&self, server_id: &str, key: &str) -> Result<Option<String>> {
            let servers = self.servers.lock();
            let server = servers
                .get(server_id)
                .ok_or_else(|| ComputeError::NotFound(format!("server {server_id}")))?;
            Ok(server.metadata.get(key).cloned())
        }

        async fn set_metadata_item(&self, server_id: &str, key: &str, value: &str) -> Result<()> {
            let mut servers = self.servers.lock();
            let server = servers
                .get_mut(server_id)
                .ok_or_else(|| ComputeError::NotFound(format!("server {server_id}")))?;
            server.metadata.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}
