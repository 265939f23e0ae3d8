//! Core types and the BMC variant interface for virtbmc.
//!
//! This crate provides the foundational pieces shared by every other virtbmc crate:
//!
//! - **Configuration**: [`BmcConfig`], the persisted record for one managed instance,
//!   and [`BaseSettings`], the connection settings every variant accepts
//! - **Codes**: IPMI [`CompletionCode`]s, [`BootDevice`] selectors and [`PowerState`]
//! - **Variants**: the [`Bmc`] trait that concrete drivers implement
//! - **Serving**: [`BmcServer`], the per-instance loop that binds the configured
//!   address and answers management requests until told to stop
//!
//! # Architecture
//!
//! ```text
//!   UDP datagram ──▶ FrameCodec::decode ──▶ protocol::dispatch ──▶ dyn Bmc
//!                                                │                   │
//!   UDP datagram ◀── FrameCodec::encode ◀── Response ◀── CompletionCode
//! ```
//!
//! # Example
//!
//! ```
//! use virtbmc_core::{BaseSettings, RawConfig};
//!
//! let mut raw = RawConfig::new();
//! raw.insert("port".into(), 6623.into());
//!
//! let settings = BaseSettings::from_raw(&raw).unwrap();
//! assert_eq!(settings.port, 6623);
//! assert_eq!(settings.username, "admin");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bmc;
pub mod codes;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use bmc::{Bmc, StopSignal};
pub use codes::{BootDevice, CompletionCode, PowerState};
pub use config::{BaseSettings, BmcConfig, RawConfig};
pub use error::{CoreError, Result};
pub use protocol::{FrameCodec, PayloadCodec, Request, Response};
pub use server::{BmcServer, ServeOptions};
