// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auth middleware: verifies the bearer credential and attaches the
//! caller context as a request extension.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use perch_core::PerchError;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Validate `Authorization: Bearer <token>` (session JWT or PAT) and
/// insert [`perch_auth::CallerContext`] for downstream handlers.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::with_action_url(
                PerchError::AuthenticationFailed {
                    reason: "missing Authorization: Bearer header".to_string(),
                },
                state.gate.action_url(),
            )
        })?;

    let context = state
        .gate
        .authenticate(token)
        .await
        .map_err(|e| ApiError::with_action_url(e, state.gate.action_url()))?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
