//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use virtbmc_control::Controller;

use crate::handlers::{bmcs, health};
use crate::state::DaemonState;

/// Create the daemon router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `GET /v1/bmcs` - List configs
/// - `POST /v1/bmcs` - Create config
/// - `GET /v1/bmcs/:name` - Get config
/// - `DELETE /v1/bmcs/:name` - Delete config, stopping it first
/// - `POST /v1/bmcs/:name/start` - Start serving
/// - `POST /v1/bmcs/:name/stop` - Stop serving
/// - `GET /v1/drivers` - List driver tags
pub fn create_router<C>(state: DaemonState<C>) -> Router
where
    C: Controller + 'static,
{
    let request_timeout = state.config.request_timeout();
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health::<C>))
        .route(
            "/v1/bmcs",
            get(bmcs::list_bmcs::<C>).post(bmcs::create_bmc::<C>),
        )
        .route(
            "/v1/bmcs/:name",
            get(bmcs::get_bmc::<C>).delete(bmcs::delete_bmc::<C>),
        )
        .route("/v1/bmcs/:name/start", post(bmcs::start_bmc::<C>))
        .route("/v1/bmcs/:name/stop", post(bmcs::stop_bmc::<C>))
        .route("/v1/drivers", get(bmcs::list_drivers::<C>))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
