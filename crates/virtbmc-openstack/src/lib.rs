//! OpenStack-backed BMC variant for virtbmc.
//!
//! This crate maps IPMI power and boot commands onto a Nova server. The
//! hard part is [`translate`]: Nova reports power as an asynchronous
//! `(status, vm_state, task_state)` triple and rejects actions that race an
//! in-flight transition, while management clients expect a synchronous
//! on/off answer and a completion code.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                OpenStackBmc                  │
//! │   power / boot commands ──▶ translate        │
//! └──────────────────────────────────────────────┘
//!                      │
//!                      ▼
//!            ┌───────────────────┐
//!            │  dyn ComputeApi   │
//!            └───────────────────┘
//!               │             │
//!               ▼             ▼
//!        ┌────────────┐  ┌─────────────┐
//!        │ NovaClient │  │ MockCompute │
//!        │ (Keystone  │  │ (tests)     │
//!        │  + Nova)   │  └─────────────┘
//!        └────────────┘
//! ```
//!
//! # Credentials
//!
//! [`NovaClient`] authenticates with Keystone v3 using the usual `OS_*`
//! environment variables. When the instance names a `cloud`, variables
//! prefixed with the upper-cased cloud name (`LAB_OS_AUTH_URL` for cloud
//! `lab`) take precedence.
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`MockCompute`], an in-memory compute
//! backend that rejects racing actions with Nova's conflict messages.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bmc;
pub mod compute;
pub mod error;
pub mod nova;
pub mod translate;
pub mod types;

pub use bmc::{OpenStackBmc, DRIVER};
pub use compute::ComputeApi;
pub use error::{ComputeError, Result};
pub use nova::{CloudConfig, NovaClient};
pub use types::{RebootType, ServerStatus, ServerView};

#[cfg(any(test, feature = "test-utils"))]
pub use compute::mock::MockCompute;
