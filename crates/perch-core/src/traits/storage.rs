// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.
//!
//! One abstract persistence capability per entity family (accounts,
//! watches, sync runs, jobs, grants, tokens, content) so the registry,
//! scheduler, and ledger never depend on a concrete storage technology.
//! Balance mutation is exposed as compare-and-swap; callers retry on
//! contention, which keeps per-account ledger operations linearizable
//! without any cross-account coordination.

use async_trait::async_trait;

use crate::error::PerchError;
use crate::types::{
    Account, ContentItem, ContentSummary, Job, JobFilter, JobStatus, SummaryPeriod,
    SyncJobRun, SyncRunStatus, WatchRegistration,
};

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Initializes the backend (migrations, connection setup).
    async fn initialize(&self) -> Result<(), PerchError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), PerchError>;

    // --- Accounts ---

    /// Fetch the account, creating it with the given starting balance if
    /// it does not exist yet. Accounts are provisioned on first
    /// authenticated request.
    async fn get_or_create_account(
        &self,
        id: &str,
        email: &str,
        starting_balance: i64,
    ) -> Result<Account, PerchError>;

    async fn get_account(&self, id: &str) -> Result<Option<Account>, PerchError>;

    /// Atomically replace the balance only if it still equals `expected`.
    /// Returns false when another writer won the race.
    async fn compare_and_swap_balance(
        &self,
        id: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, PerchError>;

    // --- Watch registrations ---

    async fn get_watch(&self, account_id: &str)
        -> Result<Option<WatchRegistration>, PerchError>;

    /// Insert or replace the registration for its account.
    async fn put_watch(&self, reg: &WatchRegistration) -> Result<(), PerchError>;

    /// All registrations currently in the watching state.
    async fn list_active_watches(&self) -> Result<Vec<WatchRegistration>, PerchError>;

    // --- Sync runs ---

    async fn insert_sync_run(&self, run: &SyncJobRun) -> Result<(), PerchError>;

    async fn update_sync_run(
        &self,
        id: &str,
        status: SyncRunStatus,
        completed_at: Option<&str>,
        items_collected: u32,
        error: Option<&str>,
    ) -> Result<(), PerchError>;

    /// Most recently started run for the account, if any.
    async fn latest_sync_run(
        &self,
        account_id: &str,
    ) -> Result<Option<SyncJobRun>, PerchError>;

    // --- Jobs ---

    async fn insert_job(&self, job: &Job) -> Result<(), PerchError>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>, PerchError>;

    /// Persist a settled job (status, actual_cost, merged metadata).
    async fn update_job(&self, job: &Job) -> Result<(), PerchError>;

    /// Move a job from `from` to `to` only if it is still in `from`.
    /// Returns false when another writer already transitioned it. This
    /// is the claim step that keeps settlement single-shot under
    /// concurrent complete/fail calls.
    async fn transition_job(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        updated_at: &str,
    ) -> Result<bool, PerchError>;

    async fn list_jobs(
        &self,
        account_id: &str,
        filter: &JobFilter,
    ) -> Result<Vec<Job>, PerchError>;

    // --- Starter-credit grants ---

    /// Amount of the one-time starter grant already issued for
    /// (account, app), or None if never granted.
    async fn starter_grant(
        &self,
        account_id: &str,
        app: &str,
    ) -> Result<Option<i64>, PerchError>;

    /// Record a grant for (account, app). Returns false when the pair
    /// was already granted, which makes the grant idempotent under
    /// concurrent first queries.
    async fn record_starter_grant(
        &self,
        account_id: &str,
        app: &str,
        amount: i64,
    ) -> Result<bool, PerchError>;

    // --- Personal-access tokens ---

    /// Store a PAT by its sha256 hex digest. Raw tokens are never persisted.
    async fn insert_pat(
        &self,
        token_hash: &str,
        account_id: &str,
        label: &str,
    ) -> Result<(), PerchError>;

    /// Account id owning the PAT with this digest, if any.
    async fn account_for_pat(&self, token_hash: &str)
        -> Result<Option<String>, PerchError>;

    // --- Content ---

    async fn insert_content(&self, item: &ContentItem) -> Result<(), PerchError>;

    /// Items collected at or after `since`, newest first.
    async fn recent_content(
        &self,
        account_id: &str,
        since: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, PerchError>;

    /// Substring match over item text, newest first.
    async fn search_content(
        &self,
        account_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, PerchError>;

    async fn put_summary(&self, summary: &ContentSummary) -> Result<(), PerchError>;

    async fn latest_summary(
        &self,
        account_id: &str,
        period: SummaryPeriod,
    ) -> Result<Option<ContentSummary>, PerchError>;

    /// Distinct data types with at least one stored item for the
    /// account. Drives the dynamic catalog in /metadata.
    async fn populated_data_types(
        &self,
        account_id: &str,
    ) -> Result<Vec<String>, PerchError>;
}
