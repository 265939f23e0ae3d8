//! Error types for compute backend calls.

use thiserror::Error;

/// A result type using `ComputeError`.
pub type Result<T> = std::result::Result<T, ComputeError>;

/// Errors returned by a compute backend.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The action was rejected because the server is mid-transition.
    ///
    /// The message carries the conflicting state as its last word.
    #[error("conflict: {message}")]
    Conflict {
        /// The backend's explanation.
        message: String,
    },

    /// The server or item doesn't exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one server carries the requested name.
    #[error("more than one server is named {0}")]
    Ambiguous(String),

    /// Keystone rejected the credentials or returned no usable token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Credentials or endpoints are missing.
    #[error("cloud configuration error: {0}")]
    Config(String),

    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other non-success response.
    #[error("compute api returned {status}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Extracted fault message.
        message: String,
    },
}

impl ComputeError {
    /// Returns true if this is a state conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Conflict { .. })
    }
}
