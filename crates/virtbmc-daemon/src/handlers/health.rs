//! Daemon health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use virtbmc_control::Controller;

use crate::state::DaemonState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the config store cannot be listed.
    pub status: String,
    /// Daemon version.
    pub version: String,
    /// Instances with a running serve loop.
    pub serving: Vec<String>,
    /// Number of persisted configs; absent while the store is unreadable.
    pub configured: Option<usize>,
}

/// Health check handler.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "serving": ["node-1"],
///   "configured": 2
/// }
/// ```
///
/// Answers 503 with status `degraded` if the config store cannot be read;
/// live instances keep serving either way.
pub async fn health<C: Controller>(
    State(state): State<Arc<DaemonState<C>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let serving = state.control.serving();

    let (code, status, configured) = match state.control.get_all().await {
        Ok(configs) => (StatusCode::OK, "healthy", Some(configs.len())),
        Err(e) => {
            tracing::warn!(error = %e, "Config store unreadable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", None)
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        serving,
        configured,
    };
    (code, Json(response))
}
