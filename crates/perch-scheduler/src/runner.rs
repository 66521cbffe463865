// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync run execution.
//!
//! A run claims the account's single-run slot, consults the rate-limit
//! policy (unless forced), then collects from the platform with timeout
//! and retry. The slot guard travels into the run task and is released
//! on every exit path.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use perch_config::model::SchedulerConfig;
use perch_core::types::{now_iso, to_iso, BackfillStatus, SyncJobRun, SyncRunStatus, WatchState};
use perch_core::{PerchError, PlatformClient, StorageAdapter};
use perch_registry::WatchRegistry;

use crate::ratelimit::{RateDecision, RateLimitPolicy};
use crate::slots::{SlotGuard, SyncSlots};

/// Accepted-sync receipt returned to the caller while the run proceeds
/// in the background.
#[derive(Debug, Clone, Serialize)]
pub struct SyncTicket {
    pub run_id: String,
    pub status: &'static str,
    pub estimated_completion: String,
}

/// Rough wall-clock estimate reported in the ticket.
const ESTIMATED_RUN_SECS: i64 = 30;

pub struct SyncRunner {
    storage: Arc<dyn StorageAdapter>,
    platform: Arc<dyn PlatformClient>,
    registry: Arc<WatchRegistry>,
    policy: Arc<dyn RateLimitPolicy>,
    slots: Arc<SyncSlots>,
    config: SchedulerConfig,
}

impl SyncRunner {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        platform: Arc<dyn PlatformClient>,
        registry: Arc<WatchRegistry>,
        policy: Arc<dyn RateLimitPolicy>,
        slots: Arc<SyncSlots>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            platform,
            registry,
            policy,
            slots,
            config,
        })
    }

    /// Start a sync for an account.
    ///
    /// `force` bypasses the rate-limit policy but never the single-run
    /// slot. Returns `sync_in_progress` when the slot is held and
    /// `rate_limited` with a future retry instant on policy denial.
    pub async fn start_sync(
        self: &Arc<Self>,
        account_id: &str,
        force: bool,
        types: Vec<String>,
    ) -> Result<SyncTicket, PerchError> {
        let registration = self
            .registry
            .get(account_id)
            .await?
            .filter(|r| r.state == WatchState::Watching)
            .ok_or(PerchError::NotWatching)?;

        // Slot first, policy second: a forced sync must still lose a
        // tie against an in-flight run.
        let guard = self
            .slots
            .try_claim(account_id)
            .ok_or(PerchError::SyncInProgress)?;

        if !force {
            if let RateDecision::Denied { retry_after } =
                self.policy.check(account_id, Utc::now())
            {
                // Record the denied attempt, then let the guard drop.
                let run = SyncJobRun {
                    id: Uuid::new_v4().to_string(),
                    account_id: account_id.to_string(),
                    forced: false,
                    status: SyncRunStatus::RateLimited,
                    started_at: now_iso(),
                    completed_at: Some(now_iso()),
                    items_collected: 0,
                    error: None,
                };
                self.storage.insert_sync_run(&run).await?;
                return Err(PerchError::RateLimited { retry_after });
            }
        }

        let run = SyncJobRun {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            forced: force,
            status: SyncRunStatus::Queued,
            started_at: now_iso(),
            completed_at: None,
            items_collected: 0,
            error: None,
        };
        self.storage.insert_sync_run(&run).await?;

        let backfill_days = match registration.backfill {
            BackfillStatus::Queued | BackfillStatus::Running => Some(registration.backfill_days),
            BackfillStatus::Done => None,
        };

        let ticket = SyncTicket {
            run_id: run.id.clone(),
            status: "syncing",
            estimated_completion: to_iso(Utc::now() + Duration::seconds(ESTIMATED_RUN_SECS)),
        };

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.execute(guard, run, types, backfill_days).await;
        });

        Ok(ticket)
    }

    /// Drive one run to a terminal state. The guard is dropped when
    /// this returns, whatever the outcome.
    async fn execute(
        &self,
        _guard: SlotGuard,
        run: SyncJobRun,
        types: Vec<String>,
        backfill_days: Option<u32>,
    ) {
        let account_id = run.account_id.clone();
        if let Err(e) = self
            .storage
            .update_sync_run(&run.id, SyncRunStatus::Running, None, 0, None)
            .await
        {
            error!(run_id = %run.id, error = %e, "failed to mark run running");
        }

        match self.collect_with_retry(&account_id, &types, backfill_days).await {
            Ok(items) => {
                let count = items.len() as u32;
                let mut stored = 0u32;
                for item in &items {
                    match self.storage.insert_content(item).await {
                        Ok(()) => stored += 1,
                        Err(e) => warn!(run_id = %run.id, error = %e, "failed to store item"),
                    }
                }
                if let Err(e) = self
                    .storage
                    .update_sync_run(
                        &run.id,
                        SyncRunStatus::Completed,
                        Some(&now_iso()),
                        stored,
                        None,
                    )
                    .await
                {
                    error!(run_id = %run.id, error = %e, "failed to mark run completed");
                }
                if let Err(e) = self.registry.record_sync(&account_id).await {
                    error!(account_id, error = %e, "failed to advance sync schedule");
                }
                self.policy.observe(&account_id, true, Utc::now());
                info!(run_id = %run.id, account_id, items = count, stored, "sync completed");
            }
            Err(e) => {
                self.policy.observe(&account_id, false, Utc::now());
                if let Err(update_err) = self
                    .storage
                    .update_sync_run(
                        &run.id,
                        SyncRunStatus::Failed,
                        Some(&now_iso()),
                        0,
                        Some(&e.to_string()),
                    )
                    .await
                {
                    error!(run_id = %run.id, error = %update_err, "failed to mark run failed");
                }
                warn!(run_id = %run.id, account_id, error = %e, "sync failed");
            }
        }
    }

    /// Platform collection with per-attempt timeout and exponential
    /// backoff between transient failures.
    async fn collect_with_retry(
        &self,
        account_id: &str,
        types: &[String],
        backfill_days: Option<u32>,
    ) -> Result<Vec<perch_core::types::ContentItem>, PerchError> {
        let per_attempt = StdDuration::from_secs(self.config.platform_timeout_secs);
        let mut last_error = None;

        for attempt in 0..=self.config.platform_retries {
            if attempt > 0 {
                let backoff = StdDuration::from_millis(500 * (1u64 << (attempt - 1)));
                tokio::time::sleep(backoff).await;
            }
            match timeout(per_attempt, self.platform.collect(account_id, types, backfill_days))
                .await
            {
                Ok(Ok(items)) => return Ok(items),
                Ok(Err(e)) => {
                    warn!(account_id, attempt, error = %e, "platform collection attempt failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(account_id, attempt, "platform collection attempt timed out");
                    last_error = Some(PerchError::Timeout {
                        duration: per_attempt,
                    });
                }
            }
        }

        Err(PerchError::Platform {
            message: format!(
                "collection failed after {} attempts",
                self.config.platform_retries + 1
            ),
            source: last_error.map(|e| Box::new(e) as _),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use perch_config::model::StorageConfig;
    use perch_core::types::ContentItem;
    use perch_registry::WatchOptions;
    use perch_storage::SqliteStorage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;
    use tokio::sync::Notify;

    use crate::ratelimit::{AdaptiveBackoff, SlidingWindow};

    /// Platform stand-in with a controllable gate and failure budget.
    struct TestPlatform {
        gate: Option<Arc<Notify>>,
        failures_before_success: AtomicU32,
    }

    impl TestPlatform {
        fn immediate() -> Arc<Self> {
            Arc::new(Self {
                gate: None,
                failures_before_success: AtomicU32::new(0),
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                gate: Some(gate),
                failures_before_success: AtomicU32::new(0),
            })
        }

        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                gate: None,
                failures_before_success: AtomicU32::new(times),
            })
        }
    }

    #[async_trait]
    impl PlatformClient for TestPlatform {
        async fn collect(
            &self,
            account_id: &str,
            _types: &[String],
            _backfill_days: Option<u32>,
        ) -> Result<Vec<ContentItem>, PerchError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let remaining = self.failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_before_success.store(remaining - 1, Ordering::SeqCst);
                return Err(PerchError::Platform {
                    message: "transient upstream failure".to_string(),
                    source: None,
                });
            }
            Ok(vec![ContentItem {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                data_type: "posts".to_string(),
                text: "hello".to_string(),
                raw: None,
                collected_at: now_iso(),
            }])
        }

        fn data_types(&self) -> Vec<String> {
            vec!["posts".to_string()]
        }
    }

    struct Harness {
        runner: Arc<SyncRunner>,
        storage: Arc<dyn StorageAdapter>,
        _dir: tempfile::TempDir,
    }

    async fn harness(
        platform: Arc<dyn PlatformClient>,
        policy: Arc<dyn RateLimitPolicy>,
    ) -> Harness {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runner.db");
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        }));
        storage.initialize().await.unwrap();

        let config = SchedulerConfig {
            platform_timeout_secs: 5,
            platform_retries: 2,
            ..Default::default()
        };
        let registry = Arc::new(WatchRegistry::new(storage.clone(), config.clone()));
        registry.watch("acct-1", WatchOptions::default()).await.unwrap();

        let runner = SyncRunner::new(
            storage.clone(),
            platform,
            registry,
            policy,
            SyncSlots::new(),
            config,
        );
        Harness {
            runner,
            storage,
            _dir: dir,
        }
    }

    async fn wait_terminal(storage: &Arc<dyn StorageAdapter>, account_id: &str) -> SyncJobRun {
        for _ in 0..200 {
            if let Some(run) = storage.latest_sync_run(account_id).await.unwrap() {
                if run.status.is_terminal() {
                    return run;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("run never reached a terminal state");
    }

    fn lenient_policy() -> Arc<dyn RateLimitPolicy> {
        Arc::new(AdaptiveBackoff::new(60, 3600))
    }

    #[tokio::test]
    async fn sync_completes_and_stores_items() {
        let h = harness(TestPlatform::immediate(), lenient_policy()).await;

        let ticket = h.runner.start_sync("acct-1", false, vec![]).await.unwrap();
        assert_eq!(ticket.status, "syncing");

        let run = wait_terminal(&h.storage, "acct-1").await;
        assert_eq!(run.status, SyncRunStatus::Completed);
        assert_eq!(run.items_collected, 1);
        assert!(run.completed_at.is_some());

        // Completion advanced the registration schedule.
        let reg = h.storage.get_watch("acct-1").await.unwrap().unwrap();
        assert!(reg.last_sync.is_some());
        assert_eq!(reg.backfill, BackfillStatus::Done);
    }

    #[tokio::test]
    async fn unwatched_account_cannot_sync() {
        let h = harness(TestPlatform::immediate(), lenient_policy()).await;
        let err = h.runner.start_sync("acct-2", false, vec![]).await.unwrap_err();
        assert!(matches!(err, PerchError::NotWatching));
    }

    #[tokio::test]
    async fn concurrent_sync_admits_exactly_one() {
        let gate = Arc::new(Notify::new());
        let h = harness(TestPlatform::gated(gate.clone()), lenient_policy()).await;

        let first = h.runner.start_sync("acct-1", false, vec![]).await;
        assert!(first.is_ok());

        // The slot is held while the first run waits on the platform.
        let second = h.runner.start_sync("acct-1", true, vec![]).await;
        assert!(matches!(second, Err(PerchError::SyncInProgress)));

        gate.notify_one();
        let run = wait_terminal(&h.storage, "acct-1").await;
        assert_eq!(run.status, SyncRunStatus::Completed);

        // Terminal run released the slot.
        gate.notify_one();
        assert!(h.runner.start_sync("acct-1", false, vec![]).await.is_ok());
        gate.notify_one();
        wait_terminal(&h.storage, "acct-1").await;
    }

    #[tokio::test]
    async fn rate_limited_sync_reports_future_retry_and_force_bypasses() {
        let policy: Arc<dyn RateLimitPolicy> = Arc::new(SlidingWindow::new(1, 3600));
        let h = harness(TestPlatform::immediate(), policy).await;

        h.runner.start_sync("acct-1", false, vec![]).await.unwrap();
        wait_terminal(&h.storage, "acct-1").await;

        let err = h.runner.start_sync("acct-1", false, vec![]).await.unwrap_err();
        match err {
            PerchError::RateLimited { retry_after } => assert!(retry_after > Utc::now()),
            other => panic!("expected rate_limited, got {other:?}"),
        }
        // The denial left a terminal rate_limited run and freed the slot.
        let run = h.storage.latest_sync_run("acct-1").await.unwrap().unwrap();
        assert_eq!(run.status, SyncRunStatus::RateLimited);

        // Force bypasses the policy.
        h.runner.start_sync("acct-1", true, vec![]).await.unwrap();
        let run = wait_terminal(&h.storage, "acct-1").await;
        assert_eq!(run.status, SyncRunStatus::Completed);
        assert!(run.forced);
    }

    #[tokio::test]
    async fn transient_platform_failures_are_retried() {
        let h = harness(TestPlatform::failing(2), lenient_policy()).await;

        h.runner.start_sync("acct-1", false, vec![]).await.unwrap();
        let run = wait_terminal(&h.storage, "acct-1").await;
        assert_eq!(run.status, SyncRunStatus::Completed);
    }

    #[tokio::test]
    async fn persistent_platform_failure_fails_run_and_frees_slot() {
        let h = harness(TestPlatform::failing(10), lenient_policy()).await;

        h.runner.start_sync("acct-1", false, vec![]).await.unwrap();
        let run = wait_terminal(&h.storage, "acct-1").await;
        assert_eq!(run.status, SyncRunStatus::Failed);
        assert!(run.error.is_some());

        // Slot is free again; the adaptive policy's penalty is bypassed
        // by force.
        let again = h.runner.start_sync("acct-1", true, vec![]).await;
        assert!(again.is_ok());
    }
}
