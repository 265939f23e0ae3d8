//! The virtbmc daemon and its HTTP call boundary.
//!
//! One daemon process owns the instance pool. Clients such as the
//! `virtbmc` CLI reach the controller through a small JSON API on a
//! loopback socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   HTTP/JSON   ┌─────────────────────────────┐
//! │ virtbmc CLI  │ ────────────▶ │  Router + Handlers          │
//! └──────────────┘               └─────────────────────────────┘
//!                                              │
//!                                              ▼
//!                                ┌─────────────────────────────┐
//!                                │  ControllerService          │
//!                                │  (store + instance pool)    │
//!                                └─────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use virtbmc_control::ControllerService;
//! use virtbmc_daemon::{create_router, DaemonConfig, DaemonState};
//! use virtbmc_store::JsonStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonStore::open("/tmp/virtbmc/bmc")?);
//! let control = Arc::new(ControllerService::with_defaults(store));
//!
//! let config = DaemonConfig::default();
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! let app = create_router(DaemonState::new(control, config));
//!
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::DaemonConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::DaemonState;
