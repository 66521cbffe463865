// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery surface: endpoint catalog, capabilities, health, and the
//! authenticated metadata view.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use perch_auth::CallerContext;
use perch_config::model::RateLimitKind;
use perch_core::types::WatchRegistration;

use crate::error::ApiError;
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct EndpointEntry {
    pub method: &'static str,
    pub path: &'static str,
    pub auth_required: bool,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiCatalog {
    pub service: String,
    pub version: &'static str,
    pub auth: AuthSummary,
    pub rate_limit: RateLimitSummary,
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Serialize)]
pub struct AuthSummary {
    pub scheme: &'static str,
    pub token_types: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitSummary {
    pub policy: &'static str,
    pub syncs_per_window: u32,
    pub window_secs: u64,
}

fn policy_slug(kind: RateLimitKind) -> &'static str {
    match kind {
        RateLimitKind::TokenBucket => "token_bucket",
        RateLimitKind::SlidingWindow => "sliding_window",
        RateLimitKind::AdaptiveBackoff => "adaptive_backoff",
    }
}

/// GET /api
///
/// Static endpoint catalog. No auth, no side effects.
pub async fn get_api_catalog(State(state): State<GatewayState>) -> Json<ApiCatalog> {
    let endpoints = vec![
        EndpointEntry { method: "GET", path: "/api", auth_required: false, description: "this catalog" },
        EndpointEntry { method: "GET", path: "/capabilities", auth_required: false, description: "supported data types and policies" },
        EndpointEntry { method: "GET", path: "/health", auth_required: false, description: "service health" },
        EndpointEntry { method: "POST", path: "/api/device/start", auth_required: false, description: "begin device authorization" },
        EndpointEntry { method: "GET", path: "/api/device/poll", auth_required: false, description: "poll device authorization" },
        EndpointEntry { method: "POST", path: "/api/device/complete", auth_required: true, description: "approve a device authorization" },
        EndpointEntry { method: "POST", path: "/watch", auth_required: true, description: "start monitoring" },
        EndpointEntry { method: "POST", path: "/unwatch", auth_required: true, description: "stop monitoring" },
        EndpointEntry { method: "POST", path: "/sync", auth_required: true, description: "request an immediate sync" },
        EndpointEntry { method: "GET", path: "/metadata", auth_required: true, description: "caller's monitoring state" },
        EndpointEntry { method: "GET", path: "/content/recent", auth_required: true, description: "recently collected items" },
        EndpointEntry { method: "GET", path: "/content/summary/{period}", auth_required: true, description: "latest periodic summary" },
        EndpointEntry { method: "POST", path: "/content/search", auth_required: true, description: "search collected items" },
        EndpointEntry { method: "GET", path: "/api/wallet", auth_required: true, description: "credit balance" },
        EndpointEntry { method: "POST", path: "/api/jobs", auth_required: true, description: "create a billable job" },
        EndpointEntry { method: "GET", path: "/api/jobs", auth_required: true, description: "list jobs" },
        EndpointEntry { method: "GET", path: "/api/jobs/{id}", auth_required: true, description: "fetch one job" },
        EndpointEntry { method: "POST", path: "/api/jobs/complete", auth_required: true, description: "settle a job" },
        EndpointEntry { method: "POST", path: "/api/jobs/fail", auth_required: true, description: "fail a job" },
    ];

    Json(ApiCatalog {
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        auth: AuthSummary {
            scheme: "bearer",
            token_types: vec!["session_token", "personal_access_token"],
        },
        rate_limit: RateLimitSummary {
            policy: policy_slug(state.scheduler.rate_limit),
            syncs_per_window: state.scheduler.per_window,
            window_secs: state.scheduler.window_secs,
        },
        endpoints,
    })
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub data_types: Vec<DataTypeEntry>,
    pub oauth: OauthProfile,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Serialize)]
pub struct DataTypeEntry {
    pub slug: String,
    pub parameters: DataTypeParameters,
}

#[derive(Debug, Serialize)]
pub struct DataTypeParameters {
    pub max_backfill_days: u32,
}

#[derive(Debug, Serialize)]
pub struct OauthProfile {
    pub required: bool,
    pub scopes: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RetentionPolicy {
    /// Days collected data survives after unwatch.
    pub days_after_unwatch: u32,
}

/// GET /capabilities
pub async fn get_capabilities(State(state): State<GatewayState>) -> Json<Capabilities> {
    let data_types = state
        .platform
        .data_types()
        .into_iter()
        .map(|slug| DataTypeEntry {
            slug,
            parameters: DataTypeParameters {
                max_backfill_days: state.scheduler.max_backfill_days,
            },
        })
        .collect();

    Json(Capabilities {
        data_types,
        oauth: OauthProfile {
            required: true,
            scopes: vec!["content.read"],
        },
        retention: RetentionPolicy {
            days_after_unwatch: state.scheduler.retention_days,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub watch: Option<WatchRegistration>,
    /// Data endpoints currently populated for this caller.
    pub data_endpoints: Vec<String>,
}

/// GET /metadata (authenticated)
pub async fn get_metadata(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let watch = state.registry.get(&caller.user_id).await?;
    let data_endpoints = state
        .storage
        .populated_data_types(&caller.user_id)
        .await?
        .into_iter()
        .map(|t| format!("/content/recent?types={t}"))
        .collect();
    Ok(Json(MetadataResponse {
        watch,
        data_endpoints,
    }))
}
