// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device authorization flow endpoints.
//!
//! `start` and `poll` are public; `complete` requires an authenticated
//! caller approving the user code.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use perch_auth::{CallerContext, PollOutcome};

use crate::error::ApiError;
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct DeviceStartResponse {
    pub device_code: String,
    pub user_code: String,
    pub expires_in_secs: u64,
    pub poll_interval_secs: u64,
}

/// POST /api/device/start
pub async fn post_device_start(State(state): State<GatewayState>) -> Json<DeviceStartResponse> {
    let codes = state.device.start();
    Json(DeviceStartResponse {
        device_code: codes.device_code,
        user_code: codes.user_code,
        expires_in_secs: codes.expires_in_secs,
        poll_interval_secs: codes.poll_interval_secs,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevicePollQuery {
    pub device_code: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DevicePollResponse {
    Pending,
    Ready { token: String },
}

/// GET /api/device/poll
///
/// 202 while pending, 200 with the token once approved.
pub async fn get_device_poll(
    State(state): State<GatewayState>,
    Query(request): Query<DevicePollQuery>,
) -> Result<Response, ApiError> {
    match state.device.poll(&request.device_code)? {
        PollOutcome::Pending => Ok((
            StatusCode::ACCEPTED,
            Json(DevicePollResponse::Pending),
        )
            .into_response()),
        PollOutcome::Ready { token } => {
            Ok(Json(DevicePollResponse::Ready { token }).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceCompleteRequest {
    pub user_code: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceCompleteResponse {
    pub status: &'static str,
}

/// POST /api/device/complete (authenticated)
pub async fn post_device_complete(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<DeviceCompleteRequest>,
) -> Result<Json<DeviceCompleteResponse>, ApiError> {
    state
        .device
        .approve(&request.user_code, &caller.user_id)
        .await?;
    Ok(Json(DeviceCompleteResponse { status: "approved" }))
}
