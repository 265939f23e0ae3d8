//! Common error types for virtbmc.
//!
//! These errors cover configuration validation, backend failures surfaced
//! by a variant, and socket binding for the serve loop.

use std::net::IpAddr;

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout virtbmc.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required configuration key is absent.
    #[error("invalid bmc config missing required: '{0}' key")]
    MissingField(String),

    /// A configuration value has the wrong type or shape.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// The offending key.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The port is not an integer in `0..=65535`.
    #[error("Invalid value in the port parameter: {0}")]
    InvalidPort(String),

    /// The address is not a valid IPv4 or IPv6 literal.
    #[error("Invalid value in the address parameter: {0}")]
    InvalidAddress(String),

    /// The variant's backing system failed or is unreachable.
    #[error("backend error: {0}")]
    Backend(String),

    /// The serve loop could not bind its socket.
    #[error("cannot bind to {address} on port {port}: {source}")]
    Bind {
        /// The configured address.
        address: IpAddr,
        /// The configured port.
        port: u16,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error on an already bound socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns true if this error came from binding the listening socket.
    #[must_use]
    pub const fn is_bind(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }

    /// Returns true if the binding failed because the process lacks privileges.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Bind { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied
        )
    }
}
