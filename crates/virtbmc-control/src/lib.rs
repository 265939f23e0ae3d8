//! Lifecycle control for virtbmc instances.
//!
//! This crate keeps two sources of truth consistent: the persisted config
//! records (intent) and the in-memory pool of serving instances
//! (execution). Only the controller touches both.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Daemon (HTTP call boundary)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ControllerService                       │
//! │  ┌──────────────┐ ┌──────────────┐ ┌────────────────────┐   │
//! │  │  Config      │ │  Recovery    │ │  Start / Stop      │   │
//! │  │  CRUD        │ │              │ │  State Machine     │   │
//! │  └──────────────┘ └──────────────┘ └────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌────────────┐ ┌────────────┐ ┌──────────────┐
//!        │ConfigStore │ │  Driver    │ │ InstancePool │
//!        │  (JSON)    │ │  Registry  │ │ (serve tasks)│
//!        └────────────┘ └────────────┘ └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use virtbmc_control::{Controller, ControllerService};
//! use virtbmc_store::JsonStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonStore::open("/tmp/virtbmc/bmc")?);
//! let controller = ControllerService::with_defaults(store);
//!
//! let serde_json::Value::Object(config) = json!({"name": "node-1", "driver": "dummy"}) else {
//!     unreachable!()
//! };
//! controller.create(config).await?;
//! controller.start("node-1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # State Machine
//!
//! Pool entries move `Created → Running → Stopped → Running ...` and are
//! dropped when the controller stops them. See the [`lifecycle`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod service;
pub mod types;

pub use driver::{DriverRegistry, DummyBmc};
pub use error::{ControlError, PoolError, Result};
pub use lifecycle::InstanceState;
pub use pool::InstancePool;
pub use service::{Controller, ControllerService};
pub use types::{ControlConfig, RecoveryFailure, RecoveryReport};

pub use virtbmc_core::{BmcConfig, RawConfig};
