//! Daemon application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use virtbmc_control::Controller;

use crate::config::DaemonConfig;

/// Shared application state for the daemon.
pub struct DaemonState<C>
where
    C: Controller,
{
    /// The controller owning the instance pool.
    pub control: Arc<C>,
    /// Daemon configuration.
    pub config: DaemonConfig,
}

impl<C> DaemonState<C>
where
    C: Controller,
{
    /// Create a new daemon state.
    #[must_use]
    pub fn new(control: Arc<C>, config: DaemonConfig) -> Self {
        Self { control, config }
    }
}

impl<C> Clone for DaemonState<C>
where
    C: Controller,
{
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            config: self.config.clone(),
        }
    }
}
