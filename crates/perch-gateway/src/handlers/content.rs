// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content surface: recent items, periodic summaries, search.
//!
//! Content payloads are opaque here; only freshness metadata carries
//! meaning.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use perch_auth::CallerContext;
use perch_core::types::{to_iso, ContentItem, ContentSummary, SummaryPeriod};
use perch_core::PerchError;

use crate::error::ApiError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_hours")]
    pub hours: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_raw: bool,
}

fn default_hours() -> u32 {
    24
}

fn default_limit() -> u32 {
    50
}

const MAX_LIMIT: u32 = 500;

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub items: Vec<ContentItem>,
    pub window_hours: u32,
}

/// GET /content/recent
pub async fn get_recent(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiError> {
    let since = to_iso(Utc::now() - Duration::hours(i64::from(query.hours)));
    let mut items = state
        .storage
        .recent_content(&caller.user_id, &since, query.limit.min(MAX_LIMIT))
        .await?;

    if !query.include_raw {
        for item in &mut items {
            item.raw = None;
        }
    }

    Ok(Json(RecentResponse {
        items,
        window_hours: query.hours,
    }))
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub period: SummaryPeriod,
    pub summary: Option<ContentSummary>,
}

/// GET /content/summary/{period}
pub async fn get_summary(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Path(period): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period = SummaryPeriod::from_str(&period)
        .map_err(|_| PerchError::InvalidRequest(format!("unknown summary period `{period}`")))?;
    let summary = state.storage.latest_summary(&caller.user_id, period).await?;
    Ok(Json(SummaryResponse { period, summary }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<ContentItem>,
}

/// POST /content/search
pub async fn post_search(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.is_empty() {
        return Err(PerchError::InvalidRequest("query must not be empty".to_string()).into());
    }
    let items = state
        .storage
        .search_content(&caller.user_id, &request.query, request.limit.min(MAX_LIMIT))
        .await?;
    Ok(Json(SearchResponse { items }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_query_defaults() {
        let query: RecentQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.hours, 24);
        assert_eq!(query.limit, 50);
        assert!(!query.include_raw);
    }

    #[test]
    fn search_request_requires_query() {
        assert!(serde_json::from_str::<SearchRequest>("{}").is_err());
    }
}
