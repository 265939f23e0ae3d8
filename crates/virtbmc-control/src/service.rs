//! Controller service implementation.
//!
//! This module provides the `Controller` trait and `ControllerService`, which
//! keeps the persisted records and the live pool consistent with each other.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use virtbmc_core::{BmcConfig, RawConfig};
use virtbmc_store::ConfigStore;

use crate::driver::{self, DriverRegistry};
use crate::error::{ControlError, PoolError, Result};
use crate::pool::InstancePool;
use crate::types::{ControlConfig, RecoveryFailure, RecoveryReport};

/// Trait defining the controller operations.
///
/// Mutating operations are serialized internally, so callers may issue
/// them concurrently.
#[async_trait]
pub trait Controller: Send + Sync {
    // =========================================================================
    // Configuration
    // =========================================================================

    /// Validate, canonicalize and persist a new config. Does not start it.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidConfig` or `ControlError::UnknownDriver`
    /// if validation fails, and `ControlError::Duplicate` if the name is
    /// already configured or live.
    async fn create(&self, config: RawConfig) -> Result<BmcConfig>;

    /// Remove a config, stopping its instance first if it is live.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if no record exists, even if a live
    /// instance was stopped.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Read a persisted config.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get(&self, name: &str) -> Result<Option<BmcConfig>>;

    /// Every persisted config, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get_all(&self) -> Result<Vec<BmcConfig>>;

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start serving a configured instance and mark it active.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an unconfigured name,
    /// `ControlError::AlreadyStarted` if it is serving, and
    /// `ControlError::Bind` or `ControlError::PermissionDenied` if its
    /// address cannot be bound.
    async fn start(&self, name: &str) -> Result<()>;

    /// Stop a live instance, drop it from the pool and mark it inactive.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotActive` if the name has no live instance
    /// and `ControlError::AlreadyStopped` if it is not serving.
    async fn stop(&self, name: &str) -> Result<()>;

    /// Restart every config marked active.
    ///
    /// Never fails as a whole; per-instance failures are reported.
    async fn recover(&self) -> RecoveryReport;

    /// Stop every live instance.
    async fn shutdown(&self);

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Registered driver tags.
    fn drivers(&self) -> Vec<String>;

    /// Names of instances whose serve loop is running, sorted.
    fn serving(&self) -> Vec<String>;
}

/// The main controller implementation.
pub struct ControllerService<S: ConfigStore> {
    store: Arc<S>,
    registry: DriverRegistry,
    pool: InstancePool,
    ops: Mutex<()>,
}

impl<S: ConfigStore> ControllerService<S> {
    /// Create a controller with an explicit driver registry.
    #[must_use]
    pub fn new(store: Arc<S>, registry: DriverRegistry, config: &ControlConfig) -> Self {
        Self {
            store,
            registry,
            pool: InstancePool::new(config.serve_options(), config.stop_grace()),
            ops: Mutex::new(()),
        }
    }

    /// Create with the built-in drivers and default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, DriverRegistry::builtin(), &ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the pool.
    #[must_use]
    pub const fn pool(&self) -> &InstancePool {
        &self.pool
    }

    /// Build and launch a persisted config. The caller holds `ops`.
    fn launch(&self, config: &BmcConfig) -> Result<()> {
        let name = config.name.as_str();

        if !self.pool.contains(name) {
            let bmc = self.registry.make_bmc(&config.to_raw()?)?;
            self.pool.create(bmc);
        }

        match self.pool.start(name) {
            Ok(_) => Ok(()),
            Err(e @ PoolError::Core(_)) => {
                self.pool.delete(name);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stop and drop a live instance. The caller holds `ops`.
    async fn halt(&self, name: &str) -> Result<()> {
        if !self.pool.contains(name) {
            return Err(ControlError::NotActive(name.to_string()));
        }

        let stopped = self.pool.stop(name).await;
        self.pool.delete(name);
        stopped.map_err(Into::into)
    }
}

#[async_trait]
impl<S: ConfigStore + 'static> Controller for ControllerService<S> {
    async fn create(&self, config: RawConfig) -> Result<BmcConfig> {
        let _guard = self.ops.lock().await;

        let (name, _) = driver::required_keys(&config)?;
        if self.pool.contains(&name) || self.store.read(&name)?.is_some() {
            return Err(ControlError::Duplicate(name));
        }

        let canonical = self.registry.make_bmc(&config)?.config();
        self.store.write(&canonical)?;

        tracing::info!(name = %canonical.name, driver = %canonical.driver, "Created bmc");
        Ok(canonical)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.ops.lock().await;

        if self.pool.contains(name) {
            if let Err(e) = self.halt(name).await {
                tracing::warn!(name = %name, error = %e, "Failed to stop bmc before delete");
            }
        }

        match self.store.delete(name) {
            Ok(()) => {
                tracing::info!(name = %name, "Deleted bmc");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(ControlError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str) -> Result<Option<BmcConfig>> {
        Ok(self.store.read(name)?)
    }

    async fn get_all(&self) -> Result<Vec<BmcConfig>> {
        Ok(self.store.get_all()?)
    }

    async fn start(&self, name: &str) -> Result<()> {
        let _guard = self.ops.lock().await;

        let config = self
            .store
            .read(name)?
            .ok_or_else(|| ControlError::NotFound(name.to_string()))?;

        self.launch(&config)?;
        self.store.set_active(name, true)?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let _guard = self.ops.lock().await;

        self.halt(name).await?;

        match self.store.set_active(name, false) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::warn!(name = %name, "Stopped a bmc with no persisted config");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recover(&self) -> RecoveryReport {
        let _guard = self.ops.lock().await;
        let mut report = RecoveryReport::default();

        let active = match self.store.get_active() {
            Ok(active) => active,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list active bmcs");
                return report;
            }
        };

        for config in active {
            let name = config.name.clone();
            if self.pool.state(&name).is_some_and(|s| s.is_started()) {
                tracing::debug!(name = %name, "Already running, skipping recovery");
                report.recovered.push(name);
                continue;
            }

            match self.launch(&config) {
                Ok(()) => {
                    tracing::info!(name = %name, "Recovered bmc");
                    report.recovered.push(name);
                }
                Err(e) => {
                    tracing::error!(name = %name, error = %e, "Failed to recover bmc");
                    report.failed.push(RecoveryFailure {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn shutdown(&self) {
        let _guard = self.ops.lock().await;
        self.pool.exit().await;
        tracing::info!("All bmcs stopped");
    }

    fn drivers(&self) -> Vec<String> {
        self.registry.drivers()
    }

    fn serving(&self) -> Vec<String> {
        self.pool
            .names()
            .into_iter()
            .filter(|name| self.pool.is_serving(name))
            .collect()
    }
}
