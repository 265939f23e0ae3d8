//! Translation of asynchronous compute state into the management vocabulary.
//!
//! Nova answers "is it on?" with a status plus an optional in-flight task,
//! and refuses actions that race a transition with a 409 whose message ends
//! in the conflicting state. Management clients want a plain on/off and a
//! completion code, and retry power commands freely. This module decides:
//!
//! - whether a server counts as powered on ([`is_active`])
//! - whether a rejected action already has the effect the caller wanted
//!   ([`resolve_conflict`]), using a per-action list of accepted states
//!
//! Nothing here caches state; every decision is made from a fresh view.

use virtbmc_core::CompletionCode;

use crate::error::ComputeError;
use crate::types::{ServerStatus, ServerView};

/// Task state of a server that is booting.
pub const POWERING_ON: &str = "powering-on";

/// States that satisfy a power on request.
pub const POWER_ON_ACCEPTS: &[&str] = &["active", POWERING_ON];

/// States that satisfy a power off request.
pub const POWER_OFF_ACCEPTS: &[&str] = &["powering-off", "stopped"];

/// States that satisfy a soft reset request.
pub const POWER_RESET_ACCEPTS: &[&str] = &["reboot_pending", "reboot_started", "rebooting"];

/// States that satisfy a power cycle request.
pub const POWER_CYCLE_ACCEPTS: &[&str] = &[
    "reboot_pending_hard",
    "reboot_started_hard",
    "rebooting_hard",
];

/// Whether the server should be reported as powered on.
///
/// True for a settled running server, and for a stopped server whose boot
/// has already been requested, so that a machine mid-boot reads as on
/// instead of flapping between polls.
#[must_use]
pub fn is_active(server: &ServerView) -> bool {
    match server.status {
        ServerStatus::Active => server.task_state.is_none(),
        ServerStatus::Shutoff => server.task_state.as_deref() == Some(POWERING_ON),
        _ => false,
    }
}

/// The state named at the end of a conflict message.
#[must_use]
pub fn conflicting_state(message: &str) -> Option<&str> {
    message.split_whitespace().last()
}

/// Classify a conflict as success if the server is already heading where
/// the caller wanted it.
#[must_use]
pub fn resolve_conflict(message: &str, accepts: &[&str]) -> CompletionCode {
    match conflicting_state(message) {
        Some(state) if accepts.contains(&state) => {
            tracing::debug!(state = state, "Conflict already satisfies the request");
            CompletionCode::Success
        }
        _ => {
            tracing::error!(message = message, "Power command rejected in present state");
            CompletionCode::CommandNotSupportedInPresentState
        }
    }
}

/// Fold the outcome of a power action into a completion code.
#[must_use]
pub fn action_result(result: Result<(), ComputeError>, accepts: &[&str]) -> CompletionCode {
    match result {
        Ok(()) => CompletionCode::Success,
        Err(ComputeError::Conflict { message }) => resolve_conflict(&message, accepts),
        Err(e) => {
            tracing::error!(error = %e, "Power command failed");
            CompletionCode::UnspecifiedError
        }
    }
}
