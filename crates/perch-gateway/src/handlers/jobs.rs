// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet and job ledger handlers.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use perch_auth::CallerContext;
use perch_core::metadata::MetadataMap;
use perch_core::types::{Job, JobFilter, JobStatus};
use perch_core::PerchError;
use perch_ledger::WalletView;

use crate::error::ApiError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    /// App slug scoping the one-time starter grant.
    #[serde(default = "default_app")]
    pub app: String,
}

fn default_app() -> String {
    "default".to_string()
}

/// GET /api/wallet
pub async fn get_wallet(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletView>, ApiError> {
    let view = state.wallet.view(&caller.user_id, &query.app).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateJobRequest {
    pub app: String,
    pub action: String,
    pub cost_estimate: i64,
    #[serde(default)]
    pub metadata: MetadataMap,
}

/// POST /api/jobs
pub async fn post_job(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state
        .ledger
        .create(
            &caller.user_id,
            &request.app,
            &request.action,
            request.cost_estimate,
            request.metadata,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(JobStatus::from_str)
        .transpose()
        .map_err(|_| {
            PerchError::InvalidRequest(format!(
                "unknown job status `{}`",
                query.status.as_deref().unwrap_or_default()
            ))
        })?;

    let jobs = state
        .ledger
        .list(
            &caller.user_id,
            &JobFilter {
                app: query.app,
                status,
                limit: query.limit,
            },
        )
        .await?;
    Ok(Json(JobListResponse { jobs }))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = state.ledger.get(&caller.user_id, &id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteJobRequest {
    pub job_id: String,
    pub actual_cost: i64,
    #[serde(default)]
    pub metadata: MetadataMap,
}

/// POST /api/jobs/complete
pub async fn post_job_complete(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<CompleteJobRequest>,
) -> Result<Json<Job>, ApiError> {
    // Ownership check before any mutation.
    state.ledger.get(&caller.user_id, &request.job_id).await?;
    let job = state
        .ledger
        .complete(&request.job_id, request.actual_cost, request.metadata)
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailJobRequest {
    pub job_id: String,
    #[serde(default = "default_refund")]
    pub refund: bool,
}

fn default_refund() -> bool {
    true
}

/// POST /api/jobs/fail
pub async fn post_job_fail(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<FailJobRequest>,
) -> Result<Json<Job>, ApiError> {
    state.ledger.get(&caller.user_id, &request.job_id).await?;
    let job = state.ledger.fail(&request.job_id, request.refund).await?;
    Ok(Json(job))
}
