// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route table and server startup.

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use perch_config::model::ServerConfig;
use perch_core::PerchError;

use crate::handlers::{content, device, discovery, jobs, lifecycle};
use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// Assemble the full route table.
///
/// Public routes (discovery, health, device start/poll) bypass the auth
/// gate; everything else runs behind [`auth_middleware`].
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/api", get(discovery::get_api_catalog))
        .route("/capabilities", get(discovery::get_capabilities))
        .route("/health", get(discovery::get_health))
        .route("/api/device/start", post(device::post_device_start))
        .route("/api/device/poll", get(device::get_device_poll))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/watch", post(lifecycle::post_watch))
        .route("/unwatch", post(lifecycle::post_unwatch))
        .route("/sync", post(lifecycle::post_sync))
        .route("/metadata", get(discovery::get_metadata))
        .route("/content/recent", get(content::get_recent))
        .route("/content/summary/{period}", get(content::get_summary))
        .route("/content/search", post(content::post_search))
        .route("/api/wallet", get(jobs::get_wallet))
        .route("/api/jobs", post(jobs::post_job).get(jobs::list_jobs))
        .route("/api/jobs/complete", post(jobs::post_job_complete))
        .route("/api/jobs/fail", post(jobs::post_job_fail))
        .route("/api/jobs/{id}", get(jobs::get_job))
        .route("/api/device/complete", post(device::post_device_complete))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process exits.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), PerchError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PerchError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| PerchError::Internal(format!("server error: {e}")))
}
