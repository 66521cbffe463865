// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watch / unwatch / sync handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use perch_auth::CallerContext;
use perch_core::PerchError;
use perch_registry::{UnwatchReceipt, WatchOptions};
use perch_scheduler::SyncTicket;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| PerchError::InvalidRequest(format!("malformed request body: {e}")).into())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchRequest {
    #[serde(default)]
    pub options: WatchOptionsBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchOptionsBody {
    #[serde(default)]
    pub backfill_days: Option<u32>,
    #[serde(default, alias = "sync_frequency_secs")]
    pub sync_frequency: Option<u32>,
}

/// POST /watch
///
/// 201 on a new registration, 200 when already watching.
pub async fn post_watch(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: WatchRequest = parse_body(&body)?;
    let outcome = state
        .registry
        .watch(
            &caller.user_id,
            WatchOptions {
                backfill_days: request.options.backfill_days,
                sync_frequency_secs: request.options.sync_frequency,
            },
        )
        .await?;

    let status = if outcome.is_new() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)).into_response())
}

/// POST /unwatch
pub async fn post_unwatch(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<UnwatchReceipt>, ApiError> {
    let receipt = state.registry.unwatch(&caller.user_id).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncRequest {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub types: Vec<String>,
}

/// POST /sync
///
/// 202: the run proceeds in the background.
pub async fn post_sync(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<SyncTicket>), ApiError> {
    let request: SyncRequest = parse_body(&body)?;
    let ticket = state
        .runner
        .start_sync(&caller.user_id, request.force, request.types)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_request_unwraps_nested_options() {
        let request: WatchRequest =
            serde_json::from_str(r#"{"options": {"backfill_days": 7, "sync_frequency": 900}}"#)
                .unwrap();
        assert_eq!(request.options.backfill_days, Some(7));
        assert_eq!(request.options.sync_frequency, Some(900));

        // An empty body and an empty options object both mean defaults.
        let empty: WatchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.options.backfill_days, None);
    }

    #[test]
    fn watch_request_rejects_unknown_fields() {
        let result = serde_json::from_str::<WatchRequest>(r#"{"options": {"backfil_days": 7}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn sync_request_defaults() {
        let request: SyncRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.force);
        assert!(request.types.is_empty());
    }
}
