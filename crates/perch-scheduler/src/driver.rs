// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background sync driver.
//!
//! On every tick the driver loads active registrations, orders the due
//! ones by how overdue they are, and starts a run for each. Schedules
//! are independent per account; an account whose slot is held or whose
//! rate limit denies is simply skipped until a later tick.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use perch_core::{PerchError, StorageAdapter};

use crate::runner::SyncRunner;

/// A due registration, ordered most-overdue first.
struct DueEntry {
    account_id: String,
    due_at: DateTime<Utc>,
}

impl PartialEq for DueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at
    }
}
impl Eq for DueEntry {}
impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: earliest due_at on top.
        other.due_at.cmp(&self.due_at)
    }
}

pub struct SyncDriver {
    storage: Arc<dyn StorageAdapter>,
    runner: Arc<SyncRunner>,
    tick: Duration,
}

impl SyncDriver {
    pub fn new(storage: Arc<dyn StorageAdapter>, runner: Arc<SyncRunner>, tick_secs: u64) -> Self {
        Self {
            storage,
            runner,
            tick: Duration::from_secs(tick_secs.max(1)),
        }
    }

    /// Run until the token is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "sync driver started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("sync driver stopping");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once().await {
                        warn!(error = %e, "driver tick failed");
                    }
                }
            }
        }
    }

    /// One pass over the due queue.
    pub async fn tick_once(&self) -> Result<(), PerchError> {
        let now = Utc::now();
        let mut due: BinaryHeap<DueEntry> = BinaryHeap::new();

        for registration in self.storage.list_active_watches().await? {
            let due_at: DateTime<Utc> = match registration.next_sync.parse() {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        account_id = %registration.account_id,
                        error = %e,
                        "skipping registration with unparsable next_sync"
                    );
                    continue;
                }
            };
            if due_at <= now {
                due.push(DueEntry {
                    account_id: registration.account_id,
                    due_at,
                });
            }
        }

        while let Some(entry) = due.pop() {
            match self.runner.start_sync(&entry.account_id, false, vec![]).await {
                Ok(ticket) => {
                    debug!(account_id = %entry.account_id, run_id = %ticket.run_id, "background sync started");
                }
                // Both are routine: a manual sync holds the slot, or the
                // policy wants the account to wait.
                Err(PerchError::SyncInProgress) | Err(PerchError::RateLimited { .. }) => {
                    debug!(account_id = %entry.account_id, "background sync skipped");
                }
                Err(e) => {
                    warn!(account_id = %entry.account_id, error = %e, "background sync failed to start");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entry(account: &str, secs_overdue: i64) -> DueEntry {
        DueEntry {
            account_id: account.to_string(),
            due_at: Utc::now() - ChronoDuration::seconds(secs_overdue),
        }
    }

    #[test]
    fn due_queue_pops_most_overdue_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry("recent", 10));
        heap.push(entry("oldest", 300));
        heap.push(entry("middle", 60));

        assert_eq!(heap.pop().unwrap().account_id, "oldest");
        assert_eq!(heap.pop().unwrap().account_id, "middle");
        assert_eq!(heap.pop().unwrap().account_id, "recent");
    }
}
