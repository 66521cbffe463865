// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use perch_config::model::StorageConfig;
use perch_core::types::{
    Account, ContentItem, ContentSummary, Job, JobFilter, JobStatus, SummaryPeriod,
    SyncJobRun, SyncRunStatus, WatchRegistration,
};
use perch_core::{PerchError, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, PerchError> {
        self.db.get().ok_or_else(|| PerchError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), PerchError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| PerchError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), PerchError> {
        self.db()?.close().await
    }

    // --- Accounts ---

    async fn get_or_create_account(
        &self,
        id: &str,
        email: &str,
        starting_balance: i64,
    ) -> Result<Account, PerchError> {
        queries::accounts::get_or_create(self.db()?, id, email, starting_balance).await
    }

    async fn get_account(&self, id: &str) -> Result<Option<Account>, PerchError> {
        queries::accounts::get(self.db()?, id).await
    }

    async fn compare_and_swap_balance(
        &self,
        id: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, PerchError> {
        queries::accounts::compare_and_swap_balance(self.db()?, id, expected, new).await
    }

    // --- Watch registrations ---

    async fn get_watch(
        &self,
        account_id: &str,
    ) -> Result<Option<WatchRegistration>, PerchError> {
        queries::watches::get(self.db()?, account_id).await
    }

    async fn put_watch(&self, reg: &WatchRegistration) -> Result<(), PerchError> {
        queries::watches::put(self.db()?, reg).await
    }

    async fn list_active_watches(&self) -> Result<Vec<WatchRegistration>, PerchError> {
        queries::watches::list_active(self.db()?).await
    }

    // --- Sync runs ---

    async fn insert_sync_run(&self, run: &SyncJobRun) -> Result<(), PerchError> {
        queries::sync_runs::insert(self.db()?, run).await
    }

    async fn update_sync_run(
        &self,
        id: &str,
        status: SyncRunStatus,
        completed_at: Option<&str>,
        items_collected: u32,
        error: Option<&str>,
    ) -> Result<(), PerchError> {
        queries::sync_runs::update(self.db()?, id, status, completed_at, items_collected, error)
            .await
    }

    async fn latest_sync_run(
        &self,
        account_id: &str,
    ) -> Result<Option<SyncJobRun>, PerchError> {
        queries::sync_runs::latest_for_account(self.db()?, account_id).await
    }

    // --- Jobs ---

    async fn insert_job(&self, job: &Job) -> Result<(), PerchError> {
        queries::jobs::insert(self.db()?, job).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, PerchError> {
        queries::jobs::get(self.db()?, id).await
    }

    async fn update_job(&self, job: &Job) -> Result<(), PerchError> {
        queries::jobs::update(self.db()?, job).await
    }

    async fn transition_job(
        &self,
        id: &str,
        from: JobStatus,
        to: JobStatus,
        updated_at: &str,
    ) -> Result<bool, PerchError> {
        queries::jobs::transition(self.db()?, id, from, to, updated_at).await
    }

    async fn list_jobs(
        &self,
        account_id: &str,
        filter: &JobFilter,
    ) -> Result<Vec<Job>, PerchError> {
        queries::jobs::list(self.db()?, account_id, filter).await
    }

    // --- Starter-credit grants ---

    async fn starter_grant(
        &self,
        account_id: &str,
        app: &str,
    ) -> Result<Option<i64>, PerchError> {
        queries::grants::get(self.db()?, account_id, app).await
    }

    async fn record_starter_grant(
        &self,
        account_id: &str,
        app: &str,
        amount: i64,
    ) -> Result<bool, PerchError> {
        queries::grants::record(self.db()?, account_id, app, amount).await
    }

    // --- Personal-access tokens ---

    async fn insert_pat(
        &self,
        token_hash: &str,
        account_id: &str,
        label: &str,
    ) -> Result<(), PerchError> {
        queries::pats::insert(self.db()?, token_hash, account_id, label).await
    }

    async fn account_for_pat(
        &self,
        token_hash: &str,
    ) -> Result<Option<String>, PerchError> {
        queries::pats::account_for(self.db()?, token_hash).await
    }

    // --- Content ---

    async fn insert_content(&self, item: &ContentItem) -> Result<(), PerchError> {
        queries::content::insert_item(self.db()?, item).await
    }

    async fn recent_content(
        &self,
        account_id: &str,
        since: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, PerchError> {
        queries::content::recent(self.db()?, account_id, since, limit).await
    }

    async fn search_content(
        &self,
        account_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ContentItem>, PerchError> {
        queries::content::search(self.db()?, account_id, query, limit).await
    }

    async fn put_summary(&self, summary: &ContentSummary) -> Result<(), PerchError> {
        queries::content::put_summary(self.db()?, summary).await
    }

    async fn latest_summary(
        &self,
        account_id: &str,
        period: SummaryPeriod,
    ) -> Result<Option<ContentSummary>, PerchError> {
        queries::content::latest_summary(self.db()?, account_id, period).await
    }

    async fn populated_data_types(
        &self,
        account_id: &str,
    ) -> Result<Vec<String>, PerchError> {
        queries::content::populated_data_types(self.db()?, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn adapter_initializes_and_serves_queries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adapter.db");
        let storage = SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        });
        storage.initialize().await.unwrap();

        let account = storage
            .get_or_create_account("acct-1", "a@example.com", 25)
            .await
            .unwrap();
        assert_eq!(account.balance, 25);

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn uninitialized_adapter_errors() {
        let storage = SqliteStorage::new(StorageConfig {
            database_path: "unused.db".to_string(),
        });
        let err = storage.get_account("x").await.unwrap_err();
        assert!(matches!(err, PerchError::Storage { .. }));
    }

    #[tokio::test]
    async fn double_initialize_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.db");
        let storage = SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        });
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }
}
