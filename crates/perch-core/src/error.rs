// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Perch monitoring service.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The primary error type used across all Perch crates.
///
/// Variants follow the protocol error taxonomy: auth errors,
/// resource-state errors, quota errors, upstream errors, and service
/// errors. The HTTP status and envelope mapping lives in the gateway;
/// nothing here knows about HTTP.
#[derive(Debug, Error)]
pub enum PerchError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Bearer credential rejected (bad signature, missing claims, unknown token).
    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Bearer credential was valid once but has expired.
    #[error("token expired")]
    TokenExpired,

    /// The account has no active watch registration.
    #[error("account is not being watched")]
    NotWatching,

    /// A sync run is already in flight for this account.
    #[error("a sync is already in progress for this account")]
    SyncInProgress,

    /// The rate limiter denied the request; retry after the given instant.
    #[error("rate limited until {retry_after}")]
    RateLimited { retry_after: DateTime<Utc> },

    /// The account's available balance cannot cover the requested reservation.
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// A job operation was attempted against a job in the wrong state.
    #[error("job {job_id} is {status}: {message}")]
    JobState {
        job_id: String,
        status: String,
        message: String,
    },

    /// The caller's request was malformed or referenced a missing resource.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream platform errors (collection API failure after retries).
    #[error("platform error: {message}")]
    Platform {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerchError {
    /// Stable machine-readable error code for the wire envelope.
    pub fn code(&self) -> &'static str {
        match self {
            PerchError::Config(_) => "config_error",
            PerchError::Storage { .. } => "internal_error",
            PerchError::AuthenticationFailed { .. } => "authentication_failed",
            PerchError::TokenExpired => "token_expired",
            PerchError::NotWatching => "not_watching",
            PerchError::SyncInProgress => "sync_in_progress",
            PerchError::RateLimited { .. } => "rate_limited",
            PerchError::InsufficientCredits { .. } => "insufficient_credits",
            PerchError::JobState { .. } => "job_state",
            PerchError::InvalidRequest(_) => "invalid_request",
            PerchError::Platform { .. } => "platform_error",
            PerchError::Timeout { .. } => "internal_error",
            PerchError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller must act before a retry can succeed
    /// (re-authenticate, buy credits). Drives `user_action_required`
    /// in the wire envelope.
    pub fn user_action_required(&self) -> bool {
        matches!(
            self,
            PerchError::AuthenticationFailed { .. }
                | PerchError::TokenExpired
                | PerchError::InsufficientCredits { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(PerchError::NotWatching.code(), "not_watching");
        assert_eq!(PerchError::SyncInProgress.code(), "sync_in_progress");
        assert_eq!(
            PerchError::InsufficientCredits {
                required: 5,
                available: 3
            }
            .code(),
            "insufficient_credits"
        );
        assert_eq!(PerchError::TokenExpired.code(), "token_expired");
        assert_eq!(
            PerchError::Internal("boom".into()).code(),
            "internal_error"
        );
    }

    #[test]
    fn user_action_required_only_for_auth_and_credits() {
        assert!(PerchError::TokenExpired.user_action_required());
        assert!(
            PerchError::AuthenticationFailed {
                reason: "bad signature".into()
            }
            .user_action_required()
        );
        assert!(
            PerchError::InsufficientCredits {
                required: 10,
                available: 0
            }
            .user_action_required()
        );
        assert!(!PerchError::SyncInProgress.user_action_required());
        assert!(!PerchError::NotWatching.user_action_required());
    }
}
