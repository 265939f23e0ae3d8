//! BMC management endpoints.
//!
//! This module provides handlers for config CRUD and start/stop.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use virtbmc_control::{BmcConfig, Controller, RawConfig};

use crate::error::ApiError;
use crate::state::DaemonState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response for the config list.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListBmcsResponse {
    /// Every persisted config, sorted by name.
    pub bmcs: Vec<BmcConfig>,
}

/// Response for start and stop.
#[derive(Debug, Serialize, Deserialize)]
pub struct LifecycleResponse {
    /// Instance name.
    pub name: String,
    /// Whether the instance is now marked active.
    pub active: bool,
}

/// Response for the driver list.
#[derive(Debug, Serialize, Deserialize)]
pub struct DriversResponse {
    /// Registered driver tags.
    pub drivers: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List all persisted configs.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list_bmcs<C>(
    State(state): State<Arc<DaemonState<C>>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    let bmcs = state.control.get_all().await?;
    Ok(Json(ListBmcsResponse { bmcs }))
}

/// Create a config. The body is the raw config object.
///
/// # Errors
///
/// Returns an error if validation fails or the name is taken.
pub async fn create_bmc<C>(
    State(state): State<Arc<DaemonState<C>>>,
    Json(body): Json<RawConfig>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    let config = state.control.create(body).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// Get a single config by name.
///
/// # Errors
///
/// Returns `ApiError::NotFound` if no record exists.
pub async fn get_bmc<C>(
    State(state): State<Arc<DaemonState<C>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    let config = state
        .control
        .get(&name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("bmc with that name doesn't exist: {name}")))?;
    Ok(Json(config))
}

/// Delete a config, stopping its instance first.
///
/// # Errors
///
/// Returns `ApiError::NotFound` if no record exists.
pub async fn delete_bmc<C>(
    State(state): State<Arc<DaemonState<C>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    state.control.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start serving an instance.
///
/// # Errors
///
/// Returns an error if the name is unknown, already started, or its
/// address cannot be bound.
pub async fn start_bmc<C>(
    State(state): State<Arc<DaemonState<C>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    state.control.start(&name).await?;
    Ok(Json(LifecycleResponse { name, active: true }))
}

/// Stop a live instance.
///
/// # Errors
///
/// Returns `ApiError::Conflict` if the instance is not live.
pub async fn stop_bmc<C>(
    State(state): State<Arc<DaemonState<C>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Controller + 'static,
{
    state.control.stop(&name).await?;
    Ok(Json(LifecycleResponse {
        name,
        active: false,
    }))
}

/// List registered driver tags.
pub async fn list_drivers<C>(State(state): State<Arc<DaemonState<C>>>) -> impl IntoResponse
where
    C: Controller + 'static,
{
    Json(DriversResponse {
        drivers: state.control.drivers(),
    })
}
