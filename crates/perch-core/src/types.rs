// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Perch workspace.
//!
//! Entity timestamps are stored as millisecond-precision ISO 8601 UTC
//! strings (the storage layer's native format); arithmetic happens in
//! chrono and is formatted at the boundary via [`now_iso`] / [`to_iso`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::metadata::MetadataMap;

/// Unique identifier for an account (opaque id from the auth issuer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a chrono instant as a millisecond-precision ISO 8601 string.
pub fn to_iso(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Current time as a millisecond-precision ISO 8601 string.
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Subscription tier of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
}

/// An identity known to the service, created on first authenticated request.
///
/// `balance` is the available (non-reserved) credit balance; job
/// reservations deduct from it at create time. Accounts are never
/// hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub balance: i64,
    pub plan: PlanTier,
    pub created_at: String,
}

/// Lifecycle state of a watch registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Watching,
    Unwatched,
}

/// Progress of the initial historical backfill.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackfillStatus {
    Queued,
    Running,
    Done,
}

/// Per-account monitoring registration.
///
/// At most one registration exists per account; unwatch flips `state`
/// to `Unwatched` and sets `retention_until` rather than deleting the
/// row, so collected data survives for the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRegistration {
    pub account_id: String,
    pub state: WatchState,
    /// When the current watch lifecycle began.
    pub since: String,
    /// Completion time of the most recent successful sync, if any.
    pub last_sync: Option<String>,
    /// When the background driver should next sync this account.
    pub next_sync: String,
    pub backfill: BackfillStatus,
    /// How many days of history the initial backfill covers.
    pub backfill_days: u32,
    /// Seconds between background syncs for this account.
    pub sync_frequency_secs: u32,
    /// End of the data-retention window after unwatch; None while watching.
    pub retention_until: Option<String>,
}

/// Status of a single sync attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Queued,
    Running,
    Completed,
    RateLimited,
    Failed,
}

impl SyncRunStatus {
    /// Terminal runs no longer hold the per-account single-run slot.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncRunStatus::Completed | SyncRunStatus::RateLimited | SyncRunStatus::Failed
        )
    }
}

/// A single sync attempt for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobRun {
    pub id: String,
    pub account_id: String,
    /// Whether the caller bypassed the soft rate limit.
    pub forced: bool,
    pub status: SyncRunStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    /// Items collected by a completed run.
    pub items_collected: u32,
    /// Failure detail for failed runs.
    pub error: Option<String>,
}

/// Lifecycle state of a billable job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Started,
    Completed,
    Failed,
}

/// A unit of billable work with a credit reservation.
///
/// `cost_estimate` is reserved (deducted from the available balance) at
/// creation; settlement on complete adjusts by the difference to
/// `actual_cost`; fail releases the reservation unless suppressed.
/// Terminal jobs are immutable apart from settlement metadata merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub account_id: String,
    /// Slug of the app that created the job.
    pub app: String,
    pub action: String,
    pub cost_estimate: i64,
    pub actual_cost: Option<i64>,
    pub status: JobStatus,
    pub metadata: MetadataMap,
    pub created_at: String,
    pub updated_at: String,
}

/// Filters for listing an account's jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub app: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
}

/// A platform-collected record. Payload processing is platform-specific
/// and opaque here; only freshness and completeness metadata carry
/// invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub account_id: String,
    /// Data type slug advertised via /capabilities (e.g. "posts").
    pub data_type: String,
    /// Short digest/preview of the item.
    pub text: String,
    /// Raw platform payload, returned only when the caller asks for it.
    pub raw: Option<serde_json::Value>,
    pub collected_at: String,
}

/// Reporting period of a stored summary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SummaryPeriod {
    Day,
    Week,
    Month,
}

/// An AI-generated digest of collected content over a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSummary {
    pub id: String,
    pub account_id: String,
    pub period: SummaryPeriod,
    pub body: String,
    pub item_count: u32,
    pub generated_at: String,
}
