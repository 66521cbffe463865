// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping of `PerchError`: status codes and the uniform wire
//! envelope. This is the only place that knows both the error taxonomy
//! and HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use perch_core::types::to_iso;
use perch_core::PerchError;

/// The uniform error envelope returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 instant after which a retry can succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<String>,
    /// Whether the caller must act (re-authenticate, buy credits)
    /// before retrying.
    pub user_action_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

/// A `PerchError` plus the remediation URL context only the gateway has.
pub struct ApiError {
    pub inner: PerchError,
    pub action_url: Option<String>,
}

impl From<PerchError> for ApiError {
    fn from(inner: PerchError) -> Self {
        Self {
            inner,
            action_url: None,
        }
    }
}

impl ApiError {
    pub fn with_action_url(inner: PerchError, action_url: &str) -> Self {
        Self {
            inner,
            action_url: Some(action_url.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.inner {
            PerchError::AuthenticationFailed { .. } | PerchError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            PerchError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            PerchError::NotWatching => StatusCode::NOT_FOUND,
            PerchError::SyncInProgress | PerchError::JobState { .. } => StatusCode::CONFLICT,
            PerchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PerchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PerchError::Platform { .. } => StatusCode::BAD_GATEWAY,
            PerchError::Config(_)
            | PerchError::Storage { .. }
            | PerchError::Timeout { .. }
            | PerchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        let details = match &self.inner {
            PerchError::InsufficientCredits {
                required,
                available,
            } => Some(serde_json::json!({
                "required": required,
                "available": available,
            })),
            PerchError::JobState { job_id, status, .. } => Some(serde_json::json!({
                "job_id": job_id,
                "status": status,
            })),
            _ => None,
        };
        let retry_after = match &self.inner {
            PerchError::RateLimited { retry_after } => Some(to_iso(*retry_after)),
            _ => None,
        };
        ErrorEnvelope {
            error: self.inner.code().to_string(),
            message: self.inner.to_string(),
            details,
            retry_after,
            user_action_required: self.inner.user_action_required(),
            action_url: if self.inner.user_action_required() {
                self.action_url.clone()
            } else {
                None
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.inner, "request failed");
        }
        (status, Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn status_mapping_follows_taxonomy() {
        let cases: Vec<(PerchError, StatusCode)> = vec![
            (
                PerchError::AuthenticationFailed {
                    reason: "bad".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (PerchError::TokenExpired, StatusCode::UNAUTHORIZED),
            (
                PerchError::InsufficientCredits {
                    required: 5,
                    available: 3,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (PerchError::NotWatching, StatusCode::NOT_FOUND),
            (PerchError::SyncInProgress, StatusCode::CONFLICT),
            (
                PerchError::RateLimited {
                    retry_after: Utc::now(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                PerchError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PerchError::Platform {
                    message: "down".into(),
                    source: None,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                PerchError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn envelope_carries_retry_after_for_rate_limits() {
        let retry = Utc::now();
        let api: ApiError = PerchError::RateLimited { retry_after: retry }.into();
        let envelope = api.envelope();
        assert_eq!(envelope.error, "rate_limited");
        assert_eq!(envelope.retry_after, Some(to_iso(retry)));
        assert!(!envelope.user_action_required);
    }

    #[test]
    fn envelope_carries_action_url_only_when_action_required() {
        let api = ApiError::with_action_url(
            PerchError::TokenExpired,
            "https://perch.example/login",
        );
        let envelope = api.envelope();
        assert!(envelope.user_action_required);
        assert_eq!(
            envelope.action_url.as_deref(),
            Some("https://perch.example/login")
        );

        let api = ApiError::with_action_url(PerchError::NotWatching, "https://perch.example");
        assert!(api.envelope().action_url.is_none());
    }

    #[test]
    fn envelope_carries_credit_details() {
        let api: ApiError = PerchError::InsufficientCredits {
            required: 9,
            available: 0,
        }
        .into();
        let envelope = api.envelope();
        let details = envelope.details.unwrap();
        assert_eq!(details["required"], 9);
        assert_eq!(details["available"], 0);
        assert!(envelope.user_action_required);
    }
}
