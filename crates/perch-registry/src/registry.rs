// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watch/unwatch operations over the storage adapter.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use perch_config::model::SchedulerConfig;
use perch_core::types::{now_iso, to_iso, BackfillStatus, WatchRegistration, WatchState};
use perch_core::{PerchError, StorageAdapter};

/// Caller-supplied options for a watch request. Unset fields fall back
/// to the scheduler defaults; `backfill_days` is clamped to the
/// configured maximum.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub backfill_days: Option<u32>,
    pub sync_frequency_secs: Option<u32>,
}

/// Result of a watch call. `already_watching` carries the original
/// registration untouched; `since` is stable across repeat calls.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WatchOutcome {
    Watching {
        #[serde(flatten)]
        registration: WatchRegistration,
    },
    AlreadyWatching {
        #[serde(flatten)]
        registration: WatchRegistration,
    },
}

impl WatchOutcome {
    pub fn registration(&self) -> &WatchRegistration {
        match self {
            WatchOutcome::Watching { registration } => registration,
            WatchOutcome::AlreadyWatching { registration } => registration,
        }
    }

    /// True for the first call of a lifecycle (maps to HTTP 201).
    pub fn is_new(&self) -> bool {
        matches!(self, WatchOutcome::Watching { .. })
    }
}

/// Result of a successful unwatch.
#[derive(Debug, Clone, Serialize)]
pub struct UnwatchReceipt {
    pub status: WatchState,
    /// How long the account was watched, in seconds.
    pub watched_duration_secs: i64,
    /// Collected data is retained until this instant.
    pub retention_until: String,
}

/// The lifecycle registry.
pub struct WatchRegistry {
    storage: Arc<dyn StorageAdapter>,
    config: SchedulerConfig,
}

impl WatchRegistry {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: SchedulerConfig) -> Self {
        Self { storage, config }
    }

    /// Register an account for monitoring.
    ///
    /// Idempotent: an active registration is returned unchanged with no
    /// new backfill. After an unwatch, a fresh lifecycle begins with
    /// `since` reset and the backfill re-queued.
    pub async fn watch(
        &self,
        account_id: &str,
        options: WatchOptions,
    ) -> Result<WatchOutcome, PerchError> {
        if let Some(existing) = self.storage.get_watch(account_id).await? {
            if existing.state == WatchState::Watching {
                return Ok(WatchOutcome::AlreadyWatching {
                    registration: existing,
                });
            }
        }

        let backfill_days = options
            .backfill_days
            .unwrap_or(self.config.default_backfill_days)
            .min(self.config.max_backfill_days);
        let sync_frequency_secs = options
            .sync_frequency_secs
            .unwrap_or(self.config.default_sync_frequency_secs);

        let now = Utc::now();
        let registration = WatchRegistration {
            account_id: account_id.to_string(),
            state: WatchState::Watching,
            since: to_iso(now),
            last_sync: None,
            // First sync is due immediately; the driver picks it up on
            // its next tick.
            next_sync: to_iso(now),
            backfill: BackfillStatus::Queued,
            backfill_days,
            sync_frequency_secs,
            retention_until: None,
        };
        self.storage.put_watch(&registration).await?;

        info!(account_id, backfill_days, "watch registered");
        Ok(WatchOutcome::Watching { registration })
    }

    /// Stop monitoring an account.
    ///
    /// Soft-removes the registration: data already collected stays
    /// available until `retention_until`. Returns `NotWatching` when
    /// there is no active registration.
    pub async fn unwatch(&self, account_id: &str) -> Result<UnwatchReceipt, PerchError> {
        let registration = match self.storage.get_watch(account_id).await? {
            Some(reg) if reg.state == WatchState::Watching => reg,
            _ => return Err(PerchError::NotWatching),
        };

        let now = Utc::now();
        let since: DateTime<Utc> = registration
            .since
            .parse()
            .map_err(|e| PerchError::Internal(format!("corrupt since timestamp: {e}")))?;
        let watched_duration_secs = (now - since).num_seconds().max(0);
        let retention_until = to_iso(now + Duration::days(i64::from(self.config.retention_days)));

        let updated = WatchRegistration {
            state: WatchState::Unwatched,
            retention_until: Some(retention_until.clone()),
            ..registration
        };
        self.storage.put_watch(&updated).await?;

        info!(account_id, watched_duration_secs, "watch removed");
        Ok(UnwatchReceipt {
            status: WatchState::Unwatched,
            watched_duration_secs,
            retention_until,
        })
    }

    /// The caller's registration, if any (for the metadata surface).
    pub async fn get(&self, account_id: &str) -> Result<Option<WatchRegistration>, PerchError> {
        self.storage.get_watch(account_id).await
    }

    /// Record a successful sync completion time and schedule the next one.
    pub async fn record_sync(&self, account_id: &str) -> Result<(), PerchError> {
        let Some(registration) = self.storage.get_watch(account_id).await? else {
            return Ok(());
        };
        let now = Utc::now();
        let updated = WatchRegistration {
            last_sync: Some(now_iso()),
            next_sync: to_iso(
                now + Duration::seconds(i64::from(registration.sync_frequency_secs)),
            ),
            backfill: match registration.backfill {
                BackfillStatus::Queued | BackfillStatus::Running => BackfillStatus::Done,
                done => done,
            },
            ..registration
        };
        self.storage.put_watch(&updated).await
    }
}
