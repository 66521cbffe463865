// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet view with one-time starter-credit grants.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use perch_config::model::LedgerConfig;
use perch_core::{PerchError, StorageAdapter};

/// Balance snapshot returned by the wallet surface.
#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub balance: i64,
    /// Credits granted by this query, zero when the (account, app) pair
    /// was already granted.
    pub granted: i64,
}

pub struct Wallet {
    storage: Arc<dyn StorageAdapter>,
    config: LedgerConfig,
}

impl Wallet {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: LedgerConfig) -> Self {
        Self { storage, config }
    }

    /// The account's balance, applying the one-time starter grant for
    /// `app` on its first query.
    pub async fn view(&self, account_id: &str, app: &str) -> Result<WalletView, PerchError> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| PerchError::InvalidRequest(format!("unknown account {account_id}")))?;

        if self.config.starter_credits <= 0
            || self.storage.starter_grant(account_id, app).await?.is_some()
        {
            return Ok(WalletView {
                balance: account.balance,
                granted: 0,
            });
        }

        let amount = self.config.starter_credits;
        // The grant record is the idempotency guard: its primary key is
        // (account, app), so a concurrent duplicate insert is ignored
        // and the losing caller skips the balance credit.
        if !self.storage.record_starter_grant(account_id, app, amount).await? {
            let balance = self
                .storage
                .get_account(account_id)
                .await?
                .ok_or_else(|| PerchError::Internal("account vanished during grant".to_string()))?
                .balance;
            return Ok(WalletView {
                balance,
                granted: 0,
            });
        }

        let mut balance = account.balance;
        for _ in 0..16 {
            if self
                .storage
                .compare_and_swap_balance(account_id, balance, balance + amount)
                .await?
            {
                balance += amount;
                info!(account_id, app, amount, "starter credits granted");
                return Ok(WalletView {
                    balance,
                    granted: amount,
                });
            }
            balance = self
                .storage
                .get_account(account_id)
                .await?
                .ok_or_else(|| PerchError::Internal("account vanished during grant".to_string()))?
                .balance;
        }
        Err(PerchError::Internal(format!(
            "starter grant for {account_id} contended beyond retry budget"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_config::model::StorageConfig;
    use perch_storage::SqliteStorage;
    use tempfile::tempdir;

    async fn setup(dir: &tempfile::TempDir) -> (Wallet, Arc<dyn StorageAdapter>) {
        let path = dir.path().join("wallet.db");
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        }));
        storage.initialize().await.unwrap();
        storage
            .get_or_create_account("acct-1", "a@example.com", 0)
            .await
            .unwrap();
        let wallet = Wallet::new(
            storage.clone(),
            LedgerConfig {
                starting_balance: 0,
                starter_credits: 100,
            },
        );
        (wallet, storage)
    }

    #[tokio::test]
    async fn first_query_grants_starter_credits_once() {
        let dir = tempdir().unwrap();
        let (wallet, _storage) = setup(&dir).await;

        let first = wallet.view("acct-1", "analyzer").await.unwrap();
        assert_eq!(first.granted, 100);
        assert_eq!(first.balance, 100);

        let second = wallet.view("acct-1", "analyzer").await.unwrap();
        assert_eq!(second.granted, 0);
        assert_eq!(second.balance, 100);
    }

    #[tokio::test]
    async fn grants_are_per_app() {
        let dir = tempdir().unwrap();
        let (wallet, _storage) = setup(&dir).await;

        wallet.view("acct-1", "analyzer").await.unwrap();
        let other = wallet.view("acct-1", "reporter").await.unwrap();
        assert_eq!(other.granted, 100);
        assert_eq!(other.balance, 200);
    }

    #[tokio::test]
    async fn grant_recorded_elsewhere_skips_credit() {
        let dir = tempdir().unwrap();
        let (wallet, storage) = setup(&dir).await;

        // A grant row written by another path must not be credited again.
        assert!(storage
            .record_starter_grant("acct-1", "analyzer", 100)
            .await
            .unwrap());
        assert!(!storage
            .record_starter_grant("acct-1", "analyzer", 100)
            .await
            .unwrap());

        let view = wallet.view("acct-1", "analyzer").await.unwrap();
        assert_eq!(view.granted, 0);
        assert_eq!(view.balance, 0);
    }

    #[tokio::test]
    async fn zero_configured_grant_is_skipped() {
        let dir = tempdir().unwrap();
        let (_, storage) = setup(&dir).await;
        let wallet = Wallet::new(
            storage,
            LedgerConfig {
                starting_balance: 0,
                starter_credits: 0,
            },
        );
        let view = wallet.view("acct-1", "analyzer").await.unwrap();
        assert_eq!(view.granted, 0);
        assert_eq!(view.balance, 0);
    }
}
