//! The in-memory registry of live instances.
//!
//! Each entry owns a variant and, while running, the task driving its
//! serve loop. All access goes through one mutex; it is never held across
//! an await.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use virtbmc_core::{Bmc, BmcConfig, BmcServer, ServeOptions};

use crate::error::PoolError;
use crate::lifecycle::{self, InstanceState};

struct RunningInstance {
    bmc: Arc<dyn Bmc>,
    state: InstanceState,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

/// Name to live instance map.
pub struct InstancePool {
    instances: Mutex<HashMap<String, RunningInstance>>,
    options: ServeOptions,
    stop_grace: Duration,
}

impl std::fmt::Debug for InstancePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancePool")
            .field("names", &self.names())
            .field("options", &self.options)
            .field("stop_grace", &self.stop_grace)
            .finish()
    }
}

impl InstancePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(options: ServeOptions, stop_grace: Duration) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            options,
            stop_grace,
        }
    }

    /// Add a variant under its name without starting it.
    ///
    /// Returns false and leaves the pool untouched if the name is taken.
    pub fn create(&self, bmc: Arc<dyn Bmc>) -> bool {
        let mut instances = self.instances.lock();
        let name = bmc.name().to_string();
        if instances.contains_key(&name) {
            return false;
        }

        instances.insert(
            name,
            RunningInstance {
                bmc,
                state: InstanceState::Created,
                local_addr: None,
                task: None,
            },
        );
        true
    }

    /// Bind the instance's address and launch its serve loop.
    ///
    /// Must be called from within a tokio runtime. Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Missing` for an unknown name,
    /// `PoolError::AlreadyStarted` if the loop is running, and
    /// `PoolError::Core` if the socket cannot be bound. A failed bind leaves
    /// the entry in its previous state.
    pub fn start(&self, name: &str) -> Result<SocketAddr, PoolError> {
        let mut instances = self.instances.lock();
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| PoolError::Missing(name.to_string()))?;

        let next = lifecycle::validate_start(name, instance.state)?;

        instance.bmc.stop_signal().rearm();
        let server = BmcServer::bind(Arc::clone(&instance.bmc), self.options.clone())?;
        let addr = server.local_addr()?;

        let task_name = name.to_string();
        let task = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(name = %task_name, error = %e, "Serve loop ended with error");
            }
        });

        instance.state = next;
        instance.local_addr = Some(addr);
        instance.task = Some(task);

        tracing::info!(name = %name, addr = %addr, "Started bmc");
        Ok(addr)
    }

    /// Signal the serve loop to return and wait for it.
    ///
    /// A loop that has not returned within the stop grace period is aborted.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Missing` for an unknown name and
    /// `PoolError::AlreadyStopped` if the loop is not running.
    pub async fn stop(&self, name: &str) -> Result<(), PoolError> {
        let (bmc, task) = {
            let mut instances = self.instances.lock();
            let instance = instances
                .get_mut(name)
                .ok_or_else(|| PoolError::Missing(name.to_string()))?;

            instance.state = lifecycle::validate_stop(name, instance.state)?;
            instance.local_addr = None;
            (Arc::clone(&instance.bmc), instance.task.take())
        };

        bmc.stop();

        if let Some(mut task) = task {
            match tokio::time::timeout(self.stop_grace, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(name = %name, error = %e, "Serve task failed");
                }
                Err(_) => {
                    tracing::warn!(
                        name = %name,
                        grace = ?self.stop_grace,
                        "Serve loop did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
        }

        tracing::info!(name = %name, "Stopped bmc");
        Ok(())
    }

    /// Remove an entry, returning its variant.
    ///
    /// The entry is expected to be stopped already; a still running loop
    /// is signalled and aborted.
    pub fn delete(&self, name: &str) -> Option<Arc<dyn Bmc>> {
        let instance = self.instances.lock().remove(name)?;
        if let Some(task) = instance.task {
            tracing::warn!(name = %name, "Removing a running bmc, aborting its serve loop");
            instance.bmc.stop();
            task.abort();
        }
        Some(instance.bmc)
    }

    /// Snapshot of an entry's canonical config.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BmcConfig> {
        self.instances.lock().get(name).map(|i| i.bmc.config())
    }

    /// Whether the name has an entry.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    /// State of an entry.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<InstanceState> {
        self.instances.lock().get(name).map(|i| i.state)
    }

    /// Address the serve loop is bound to, while running.
    #[must_use]
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.instances.lock().get(name).and_then(|i| i.local_addr)
    }

    /// Whether the serve loop is still executing.
    ///
    /// False once the loop has returned on its own, for example after a
    /// cold reset, even though the entry is still marked running.
    #[must_use]
    pub fn is_serving(&self, name: &str) -> bool {
        self.instances
            .lock()
            .get(name)
            .and_then(|i| i.task.as_ref())
            .is_some_and(|task| !task.is_finished())
    }

    /// Entry names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Stop every running entry, tolerating those already stopped.
    pub async fn exit(&self) {
        for name in self.names() {
            match self.stop(&name).await {
                Ok(()) | Err(PoolError::AlreadyStopped(_) | PoolError::Missing(_)) => {}
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Failed to stop bmc on exit");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DummyBmc;
    use virtbmc_core::BaseSettings;

    fn loopback(name: &str) -> Arc<dyn Bmc> {
        let settings = BaseSettings {
            address: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..BaseSettings::default()
        };
        Arc::new(DummyBmc::new(name, settings))
    }

    fn create_test_pool() -> InstancePool {
        InstancePool::new(
            ServeOptions {
                wake_interval: Duration::from_millis(20),
            },
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn create_does_not_replace() {
        let pool = create_test_pool();
        assert!(pool.create(loopback("a")));
        assert!(!pool.create(loopback("a")));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.state("a"), Some(InstanceState::Created));
    }

    #[tokio::test]
    async fn start_stop_start() {
        let pool = create_test_pool();
        pool.create(loopback("a"));

        pool.start("a").unwrap();
        assert_eq!(pool.state("a"), Some(InstanceState::Running));
        assert!(pool.local_addr("a").is_some());
        assert!(pool.is_serving("a"));

        pool.stop("a").await.unwrap();
        assert_eq!(pool.state("a"), Some(InstanceState::Stopped));
        assert!(!pool.is_serving("a"));

        pool.start("a").unwrap();
        assert!(pool.is_serving("a"));
        pool.exit().await;
    }

    #[tokio::test]
    async fn double_start_and_stop_are_reported() {
        let pool = create_test_pool();
        pool.create(loopback("a"));

        assert!(matches!(
            pool.stop("a").await,
            Err(PoolError::AlreadyStopped(_))
        ));

        pool.start("a").unwrap();
        assert!(matches!(pool.start("a"), Err(PoolError::AlreadyStarted(_))));

        pool.stop("a").await.unwrap();
        assert!(matches!(
            pool.stop("a").await,
            Err(PoolError::AlreadyStopped(_))
        ));
    }

    #[tokio::test]
    async fn missing_names_are_reported() {
        let pool = create_test_pool();
        assert!(matches!(pool.start("x"), Err(PoolError::Missing(_))));
        assert!(matches!(pool.stop("x").await, Err(PoolError::Missing(_))));
        assert!(pool.delete("x").is_none());
    }

    #[tokio::test]
    async fn bind_failure_leaves_entry_created() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let settings = BaseSettings {
            address: "127.0.0.1".parse().unwrap(),
            port,
            ..BaseSettings::default()
        };

        let pool = create_test_pool();
        pool.create(Arc::new(DummyBmc::new("a", settings)));

        let err = pool.start("a").unwrap_err();
        assert!(matches!(err, PoolError::Core(ref e) if e.is_bind()));
        assert_eq!(pool.state("a"), Some(InstanceState::Created));
    }

    #[tokio::test]
    async fn exit_tolerates_stopped_entries() {
        let pool = create_test_pool();
        pool.create(loopback("a"));
        pool.create(loopback("b"));
        pool.start("b").unwrap();

        pool.exit().await;
        assert_eq!(pool.state("a"), Some(InstanceState::Created));
        assert_eq!(pool.state("b"), Some(InstanceState::Stopped));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let pool = create_test_pool();
        pool.create(loopback("a"));
        pool.start("a").unwrap();
        pool.stop("a").await.unwrap();

        assert!(pool.delete("a").is_some());
        assert!(!pool.contains("a"));
        assert!(pool.get("a").is_none());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn cold_reset_ends_serving() {
        let pool = create_test_pool();
        let bmc = loopback("a");
        pool.create(Arc::clone(&bmc));
        pool.start("a").unwrap();

        bmc.cold_reset().await;
        for _ in 0..50 {
            if !pool.is_serving("a") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!pool.is_serving("a"));
        assert_eq!(pool.state("a"), Some(InstanceState::Running));

        pool.stop("a").await.unwrap();
    }
}
