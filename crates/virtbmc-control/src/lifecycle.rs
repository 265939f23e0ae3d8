//! Instance pool state machine.
//!
//! ```text
//!   (absent) ──create──▶ Created ──start──▶ Running
//!                                            │  ▲
//!                                       stop │  │ start
//!                                            ▼  │
//!   (absent) ◀──delete──────────────────── Stopped
//! ```
//!
//! Starting a running instance or stopping one that is not running is
//! reported, never swallowed.

use serde::Serialize;

use crate::error::PoolError;

/// Where a pooled instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Built but never started.
    Created,
    /// The serve loop has been launched.
    Running,
    /// The serve loop has been told to stop.
    Stopped,
}

impl InstanceState {
    /// Whether the serve loop has been launched and not stopped.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: InstanceState, to: InstanceState) -> bool {
    use InstanceState::{Created, Running, Stopped};

    matches!((from, to), (Created | Stopped, Running) | (Running, Stopped))
}

/// Validate a start request.
///
/// # Errors
///
/// Returns `PoolError::AlreadyStarted` if the instance is running.
pub fn validate_start(name: &str, state: InstanceState) -> Result<InstanceState, PoolError> {
    if is_valid_transition(state, InstanceState::Running) {
        Ok(InstanceState::Running)
    } else {
        Err(PoolError::AlreadyStarted(name.to_string()))
    }
}

/// Validate a stop request.
///
/// # Errors
///
/// Returns `PoolError::AlreadyStopped` if the instance is not running.
pub fn validate_stop(name: &str, state: InstanceState) -> Result<InstanceState, PoolError> {
    if is_valid_transition(state, InstanceState::Stopped) {
        Ok(InstanceState::Stopped)
    } else {
        Err(PoolError::AlreadyStopped(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use InstanceState::*;

        assert!(is_valid_transition(Created, Running));
        assert!(is_valid_transition(Running, Stopped));
        assert!(is_valid_transition(Stopped, Running));
    }

    #[test]
    fn invalid_transitions() {
        use InstanceState::*;

        assert!(!is_valid_transition(Running, Running));
        assert!(!is_valid_transition(Stopped, Stopped));
        assert!(!is_valid_transition(Created, Stopped));
        assert!(!is_valid_transition(Running, Created));
    }

    #[test]
    fn double_start_is_reported() {
        let err = validate_start("a", InstanceState::Running).unwrap_err();
        assert!(matches!(err, PoolError::AlreadyStarted(name) if name == "a"));
    }

    #[test]
    fn stop_before_start_is_reported() {
        assert!(matches!(
            validate_stop("a", InstanceState::Created),
            Err(PoolError::AlreadyStopped(_))
        ));
        assert_eq!(
            validate_stop("a", InstanceState::Running).unwrap(),
            InstanceState::Stopped
        );
    }

    #[test]
    fn started_flag() {
        assert!(InstanceState::Running.is_started());
        assert!(!InstanceState::Created.is_started());
        assert!(!InstanceState::Stopped.is_started());
    }
}
