//! Error types for the controller and the instance pool.
//!
//! [`ControlError`] is the vocabulary callers of the controller see.
//! [`PoolError`] is what the pool reports for state machine misuse; the
//! controller re-wraps it.

use std::net::IpAddr;

use thiserror::Error;
use virtbmc_core::CoreError;
use virtbmc_store::StoreError;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in controller operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The configuration failed validation.
    #[error("{0}")]
    InvalidConfig(String),

    /// The driver tag does not resolve to a registered variant.
    #[error("driver with name {driver} not available in {available:?}")]
    UnknownDriver {
        /// The requested tag.
        driver: String,
        /// Every registered tag.
        available: Vec<String>,
    },

    /// The name is already configured or live.
    #[error("Bmc with that name already exists: {0}")]
    Duplicate(String),

    /// No persisted record carries this name.
    #[error("bmc with that name doesn't exist: {0}")]
    NotFound(String),

    /// The name has no instance in the pool.
    #[error("No BMC with that name is active: {0}")]
    NotActive(String),

    /// The instance is already serving.
    #[error("bmc {0} already started")]
    AlreadyStarted(String),

    /// The instance is not serving.
    #[error("bmc {0} already stopped")]
    AlreadyStopped(String),

    /// The process may not bind the configured address.
    #[error("Permission denied to bind to {address} on port {port}")]
    PermissionDenied {
        /// The configured address.
        address: IpAddr,
        /// The configured port.
        port: u16,
    },

    /// The configured address could not be bound.
    #[error("cannot bind to {address} on port {port}: {reason}")]
    Bind {
        /// The configured address.
        address: IpAddr,
        /// The configured port.
        port: u16,
        /// The socket error.
        reason: String,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidConfig(_) | Self::UnknownDriver { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Duplicate(_)
            | Self::NotActive(_)
            | Self::AlreadyStarted(_)
            | Self::AlreadyStopped(_) => 409,
            Self::PermissionDenied { .. } | Self::Bind { .. } => 503,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. } | Self::Store(_) | Self::Internal(_)
        )
    }
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Bind {
                address,
                port,
                source,
            } => {
                if source.kind() == std::io::ErrorKind::PermissionDenied {
                    Self::PermissionDenied { address, port }
                } else {
                    Self::Bind {
                        address,
                        port,
                        reason: source.to_string(),
                    }
                }
            }
            CoreError::Io(e) => Self::Internal(e.to_string()),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

/// Errors reported by the instance pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `start` on a serving instance.
    #[error("bmc {0} already started")]
    AlreadyStarted(String),

    /// `stop` on an instance that is not serving.
    #[error("bmc {0} already stopped")]
    AlreadyStopped(String),

    /// The name has no pool entry.
    #[error("bmc {0} is not in the pool")]
    Missing(String),

    /// The serve loop could not be set up.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<PoolError> for ControlError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AlreadyStarted(name) => Self::AlreadyStarted(name),
            PoolError::AlreadyStopped(name) => Self::AlreadyStopped(name),
            PoolError::Missing(name) => Self::NotActive(name),
            PoolError::Core(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn bind_error(kind: io::ErrorKind) -> CoreError {
        CoreError::Bind {
            address: "::".parse().unwrap(),
            port: 623,
            source: io::Error::from(kind),
        }
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(ControlError::InvalidConfig("x".into()).http_status_code(), 400);
        assert_eq!(
            ControlError::UnknownDriver {
                driver: "x".into(),
                available: vec!["dummy".into()]
            }
            .http_status_code(),
            400
        );
        assert_eq!(ControlError::NotFound("a".into()).http_status_code(), 404);
        assert_eq!(ControlError::Duplicate("a".into()).http_status_code(), 409);
        assert_eq!(ControlError::NotActive("a".into()).http_status_code(), 409);
        assert_eq!(ControlError::AlreadyStarted("a".into()).http_status_code(), 409);
        assert_eq!(ControlError::AlreadyStopped("a".into()).http_status_code(), 409);
        assert_eq!(ControlError::Internal("x".into()).http_status_code(), 500);
    }

    #[test]
    fn permission_denied_names_address_and_port() {
        let err = ControlError::from(bind_error(io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "Permission denied to bind to :: on port 623");
        assert_eq!(err.http_status_code(), 503);
    }

    #[test]
    fn other_bind_failures_keep_the_reason() {
        let err = ControlError::from(bind_error(io::ErrorKind::AddrInUse));
        match err {
            ControlError::Bind { port, .. } => assert_eq!(port, 623),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_errors_become_invalid_config() {
        let err = ControlError::from(CoreError::MissingField("name".into()));
        assert_eq!(
            err.to_string(),
            "invalid bmc config missing required: 'name' key"
        );
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn pool_errors_map_to_controller_vocabulary() {
        assert!(matches!(
            ControlError::from(PoolError::AlreadyStarted("a".into())),
            ControlError::AlreadyStarted(_)
        ));
        assert!(matches!(
            ControlError::from(PoolError::Missing("a".into())),
            ControlError::NotActive(_)
        ));
    }

    #[test]
    fn unknown_driver_lists_tags() {
        let err = ControlError::UnknownDriver {
            driver: "vmware".into(),
            available: vec!["dummy".into(), "openstack".into()],
        };
        assert_eq!(
            err.to_string(),
            r#"driver with name vmware not available in ["dummy", "openstack"]"#
        );
    }
}
