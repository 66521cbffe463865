// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job ledger: reservation at create, settlement at complete,
//! refund on fail.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use perch_core::metadata::{merge_metadata, MetadataMap};
use perch_core::types::{now_iso, Job, JobFilter, JobStatus};
use perch_core::{PerchError, StorageAdapter};

/// Attempts before a compare-and-swap balance update gives up. The
/// SQLite writer serializes physical writes, so contention resolves in
/// one or two rounds in practice.
const CAS_ATTEMPTS: u32 = 16;

pub struct JobLedger {
    storage: Arc<dyn StorageAdapter>,
}

impl JobLedger {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Apply `delta` to an account's balance via compare-and-swap,
    /// retrying on interleaved writers. A negative delta fails with
    /// `insufficient_credits` rather than driving the balance below
    /// zero.
    async fn adjust_balance(&self, account_id: &str, delta: i64) -> Result<i64, PerchError> {
        for _ in 0..CAS_ATTEMPTS {
            let account = self
                .storage
                .get_account(account_id)
                .await?
                .ok_or_else(|| PerchError::InvalidRequest(format!("unknown account {account_id}")))?;

            let new_balance = account.balance + delta;
            if new_balance < 0 {
                return Err(PerchError::InsufficientCredits {
                    required: -delta,
                    available: account.balance,
                });
            }

            if self
                .storage
                .compare_and_swap_balance(account_id, account.balance, new_balance)
                .await?
            {
                return Ok(new_balance);
            }
            debug!(account_id, "balance CAS lost, retrying");
        }
        Err(PerchError::Internal(format!(
            "balance update for {account_id} contended beyond {CAS_ATTEMPTS} attempts"
        )))
    }

    /// Create a job, reserving `cost_estimate` from the account's
    /// available balance.
    pub async fn create(
        &self,
        account_id: &str,
        app: &str,
        action: &str,
        cost_estimate: i64,
        metadata: MetadataMap,
    ) -> Result<Job, PerchError> {
        if cost_estimate < 0 {
            return Err(PerchError::InvalidRequest(
                "cost_estimate must be non-negative".to_string(),
            ));
        }

        self.adjust_balance(account_id, -cost_estimate).await?;

        let now = now_iso();
        let job = Job {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            app: app.to_string(),
            action: action.to_string(),
            cost_estimate,
            actual_cost: None,
            status: JobStatus::Started,
            metadata,
            created_at: now.clone(),
            updated_at: now,
        };

        if let Err(e) = self.storage.insert_job(&job).await {
            // Undo the reservation if the insert itself fails.
            if let Err(refund_err) = self.adjust_balance(account_id, cost_estimate).await {
                warn!(account_id, error = %refund_err, "reservation refund failed after insert error");
            }
            return Err(e);
        }

        info!(job_id = %job.id, account_id, app, cost_estimate, "job created");
        Ok(job)
    }

    /// Atomically claim a started job for the terminal status `to`.
    /// Losing the claim means another caller settled (or is settling)
    /// the job, surfaced as `job_state` with the status they set.
    async fn claim_started(&self, job_id: &str, to: JobStatus) -> Result<Job, PerchError> {
        let job = self
            .storage
            .get_job(job_id)
            .await?
            .ok_or_else(|| PerchError::InvalidRequest(format!("unknown job {job_id}")))?;

        let now = now_iso();
        if !self
            .storage
            .transition_job(&job.id, JobStatus::Started, to, &now)
            .await?
        {
            let status = self
                .storage
                .get_job(job_id)
                .await?
                .map(|j| j.status.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(PerchError::JobState {
                job_id: job.id.clone(),
                status,
                message: "only started jobs can transition".to_string(),
            });
        }
        Ok(job)
    }

    /// Undo a claimed transition after a failed settlement so the job
    /// is visible as `started` again. Failure here leaves the job
    /// terminal but unsettled, which is logged rather than masking the
    /// original settlement error.
    async fn release_claim(&self, job_id: &str, from: JobStatus) {
        if let Err(e) = self
            .storage
            .transition_job(job_id, from, JobStatus::Started, &now_iso())
            .await
        {
            warn!(job_id, error = %e, "failed to release job claim after settlement error");
        }
    }

    /// Complete a job, settling the difference between actual and
    /// estimated cost. An uncoverable overage leaves the job `started`
    /// and the balance untouched.
    pub async fn complete(
        &self,
        job_id: &str,
        actual_cost: i64,
        metadata: MetadataMap,
    ) -> Result<Job, PerchError> {
        if actual_cost < 0 {
            return Err(PerchError::InvalidRequest(
                "actual_cost must be non-negative".to_string(),
            ));
        }
        let mut job = self.claim_started(job_id, JobStatus::Completed).await?;

        // delta > 0 charges more, delta < 0 refunds the difference. The
        // claim above guarantees this settles at most once per job.
        let delta = actual_cost - job.cost_estimate;
        if delta != 0 {
            if let Err(e) = self.adjust_balance(&job.account_id, -delta).await {
                self.release_claim(&job.id, JobStatus::Completed).await;
                return Err(e);
            }
        }

        merge_metadata(&mut job.metadata, metadata);
        job.actual_cost = Some(actual_cost);
        job.status = JobStatus::Completed;
        job.updated_at = now_iso();
        self.storage.update_job(&job).await?;

        info!(job_id = %job.id, actual_cost, delta, "job completed");
        Ok(job)
    }

    /// Fail a job. `refund` restores the full reservation.
    pub async fn fail(&self, job_id: &str, refund: bool) -> Result<Job, PerchError> {
        let mut job = self.claim_started(job_id, JobStatus::Failed).await?;

        if refund && job.cost_estimate > 0 {
            if let Err(e) = self.adjust_balance(&job.account_id, job.cost_estimate).await {
                self.release_claim(&job.id, JobStatus::Failed).await;
                return Err(e);
            }
        }

        job.status = JobStatus::Failed;
        job.updated_at = now_iso();
        self.storage.update_job(&job).await?;

        info!(job_id = %job.id, refund, "job failed");
        Ok(job)
    }

    /// List an account's jobs, newest first. Pure read.
    pub async fn list(
        &self,
        account_id: &str,
        filter: &JobFilter,
    ) -> Result<Vec<Job>, PerchError> {
        self.storage.list_jobs(account_id, filter).await
    }

    /// Fetch a single job, scoped to its owning account.
    pub async fn get(&self, account_id: &str, job_id: &str) -> Result<Job, PerchError> {
        let job = self
            .storage
            .get_job(job_id)
            .await?
            .filter(|j| j.account_id == account_id)
            .ok_or_else(|| PerchError::InvalidRequest(format!("unknown job {job_id}")))?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_config::model::StorageConfig;
    use perch_core::metadata::MetadataValue;
    use perch_storage::SqliteStorage;
    use tempfile::tempdir;

    async fn setup(dir: &tempfile::TempDir, balance: i64) -> (JobLedger, Arc<dyn StorageAdapter>) {
        let path = dir.path().join("ledger.db");
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        }));
        storage.initialize().await.unwrap();
        storage
            .get_or_create_account("acct-1", "a@example.com", balance)
            .await
            .unwrap();
        (JobLedger::new(storage.clone()), storage)
    }

    async fn balance(storage: &Arc<dyn StorageAdapter>) -> i64 {
        storage.get_account("acct-1").await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn create_reserves_estimate() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Started);
        assert_eq!(balance(&storage).await, 5);
    }

    #[tokio::test]
    async fn create_rejects_uncovered_estimate() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 3).await;

        let err = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap_err();
        match err {
            PerchError::InsufficientCredits { required, available } => {
                assert_eq!(required, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected insufficient_credits, got {other:?}"),
        }
        assert_eq!(balance(&storage).await, 3);
    }

    #[tokio::test]
    async fn complete_refunds_cheaper_actual() {
        // Balance 10, estimate 5, actual 3: settle refunds 2, final 7.
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();
        assert_eq!(balance(&storage).await, 5);

        let done = ledger.complete(&job.id, 3, MetadataMap::new()).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.actual_cost, Some(3));
        assert_eq!(balance(&storage).await, 7);
    }

    #[tokio::test]
    async fn complete_charges_overage() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();
        ledger.complete(&job.id, 8, MetadataMap::new()).await.unwrap();
        assert_eq!(balance(&storage).await, 2);
    }

    #[tokio::test]
    async fn uncoverable_overage_leaves_job_started() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 5).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();
        assert_eq!(balance(&storage).await, 0);

        let err = ledger.complete(&job.id, 9, MetadataMap::new()).await.unwrap_err();
        assert!(matches!(err, PerchError::InsufficientCredits { .. }));

        let unchanged = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, JobStatus::Started);
        assert_eq!(balance(&storage).await, 0);
    }

    #[tokio::test]
    async fn double_complete_is_rejected_without_double_settlement() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();
        ledger.complete(&job.id, 3, MetadataMap::new()).await.unwrap();
        assert_eq!(balance(&storage).await, 7);

        let err = ledger.complete(&job.id, 3, MetadataMap::new()).await.unwrap_err();
        assert!(matches!(err, PerchError::JobState { .. }));
        assert_eq!(balance(&storage).await, 7);
    }

    #[tokio::test]
    async fn concurrent_completes_settle_exactly_once() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;
        let ledger = Arc::new(ledger);

        let job = ledger
            .create("acct-1", "analyzer", "run", 5, MetadataMap::new())
            .await
            .unwrap();

        let first = {
            let ledger = ledger.clone();
            let id = job.id.clone();
            tokio::spawn(async move { ledger.complete(&id, 3, MetadataMap::new()).await })
        };
        let second = {
            let ledger = ledger.clone();
            let id = job.id.clone();
            tokio::spawn(async move { ledger.complete(&id, 3, MetadataMap::new()).await })
        };
        let results = [first.await.unwrap(), second.await.unwrap()];

        // Exactly one caller wins the claim; the loser sees job_state
        // and the refund is applied once.
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(PerchError::JobState { .. }))));
        assert_eq!(balance(&storage).await, 7);
    }

    #[tokio::test]
    async fn fail_with_refund_restores_reservation() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 4, MetadataMap::new())
            .await
            .unwrap();
        assert_eq!(balance(&storage).await, 6);

        let failed = ledger.fail(&job.id, true).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(balance(&storage).await, 10);
    }

    #[tokio::test]
    async fn fail_without_refund_keeps_charge() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;

        let job = ledger
            .create("acct-1", "analyzer", "run", 4, MetadataMap::new())
            .await
            .unwrap();
        ledger.fail(&job.id, false).await.unwrap();
        assert_eq!(balance(&storage).await, 6);
    }

    #[tokio::test]
    async fn complete_merges_metadata_by_key() {
        let dir = tempdir().unwrap();
        let (ledger, _storage) = setup(&dir, 10).await;

        let mut initial = MetadataMap::new();
        initial.insert("kept".to_string(), MetadataValue::Int(1));
        initial.insert("replaced".to_string(), MetadataValue::Int(2));
        let job = ledger
            .create("acct-1", "analyzer", "run", 1, initial)
            .await
            .unwrap();

        let mut update = MetadataMap::new();
        update.insert("replaced".to_string(), MetadataValue::Int(3));
        update.insert("added".to_string(), MetadataValue::Bool(true));
        let done = ledger.complete(&job.id, 1, update).await.unwrap();

        assert_eq!(done.metadata.get("kept"), Some(&MetadataValue::Int(1)));
        assert_eq!(done.metadata.get("replaced"), Some(&MetadataValue::Int(3)));
        assert_eq!(done.metadata.get("added"), Some(&MetadataValue::Bool(true)));
    }

    #[tokio::test]
    async fn list_filters_by_app_and_status() {
        let dir = tempdir().unwrap();
        let (ledger, _storage) = setup(&dir, 100).await;

        let a = ledger
            .create("acct-1", "analyzer", "run", 1, MetadataMap::new())
            .await
            .unwrap();
        ledger
            .create("acct-1", "reporter", "run", 1, MetadataMap::new())
            .await
            .unwrap();
        ledger.complete(&a.id, 1, MetadataMap::new()).await.unwrap();

        let analyzer_only = ledger
            .list(
                "acct-1",
                &JobFilter {
                    app: Some("analyzer".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(analyzer_only.len(), 1);
        assert_eq!(analyzer_only[0].app, "analyzer");

        let completed = ledger
            .list(
                "acct-1",
                &JobFilter {
                    status: Some(JobStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a.id);
    }

    #[tokio::test]
    async fn get_is_scoped_to_owner() {
        let dir = tempdir().unwrap();
        let (ledger, storage) = setup(&dir, 10).await;
        storage
            .get_or_create_account("acct-2", "b@example.com", 0)
            .await
            .unwrap();

        let job = ledger
            .create("acct-1", "analyzer", "run", 1, MetadataMap::new())
            .await
            .unwrap();
        assert!(ledger.get("acct-1", &job.id).await.is_ok());
        assert!(ledger.get("acct-2", &job.id).await.is_err());
    }
}
