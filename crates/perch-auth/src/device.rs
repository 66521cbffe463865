// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device authorization flow for headless clients.
//!
//! A client starts the flow and receives a device code plus a short
//! user code. The user approves the user code through an authenticated
//! channel, which mints a personal-access token. The client polls with
//! the device code until the token is ready or the codes expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

use perch_core::{PerchError, StorageAdapter};

use crate::gate::{generate_pat, hash_token};

/// Outcome of polling a device code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Approval has not happened yet; keep polling.
    Pending,
    /// The flow was approved; the token is returned exactly once.
    Ready { token: String },
}

/// A started-but-unapproved flow.
struct PendingFlow {
    user_code: String,
    started: Instant,
    /// Set on approval, taken on the next poll.
    token: Option<String>,
}

/// Codes handed to the client when a flow starts.
#[derive(Debug, Clone)]
pub struct DeviceCodes {
    pub device_code: String,
    pub user_code: String,
    pub expires_in_secs: u64,
    pub poll_interval_secs: u64,
}

/// In-memory device flow registry. Pending flows do not survive a
/// restart; clients restart the flow on an unknown device code.
pub struct DeviceFlow {
    pending: DashMap<String, PendingFlow>,
    /// user_code -> device_code, for approval lookup.
    by_user_code: DashMap<String, String>,
    storage: Arc<dyn StorageAdapter>,
    ttl: Duration,
}

const POLL_INTERVAL_SECS: u64 = 5;

/// Alphabet for user codes, chosen to avoid lookalike characters.
const USER_CODE_CHARS: &[u8] = b"BCDFGHJKLMNPQRSTVWXZ23456789";

fn random_user_code() -> String {
    (0..8)
        .map(|_| {
            let idx = rand::random::<usize>() % USER_CODE_CHARS.len();
            USER_CODE_CHARS[idx] as char
        })
        .collect()
}

impl DeviceFlow {
    pub fn new(storage: Arc<dyn StorageAdapter>, ttl_secs: u64) -> Self {
        Self {
            pending: DashMap::new(),
            by_user_code: DashMap::new(),
            storage,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Start a new flow and return the codes to show the client.
    pub fn start(&self) -> DeviceCodes {
        self.sweep_expired();

        let device_code = format!("dev_{}", hex::encode(rand::random::<[u8; 16]>()));
        let user_code = random_user_code();

        self.by_user_code
            .insert(user_code.clone(), device_code.clone());
        self.pending.insert(
            device_code.clone(),
            PendingFlow {
                user_code: user_code.clone(),
                started: Instant::now(),
                token: None,
            },
        );

        debug!(user_code = %user_code, "device flow started");
        DeviceCodes {
            device_code,
            user_code,
            expires_in_secs: self.ttl.as_secs(),
            poll_interval_secs: POLL_INTERVAL_SECS,
        }
    }

    /// Approve a pending flow by user code, minting a personal-access
    /// token owned by `account_id`.
    pub async fn approve(&self, user_code: &str, account_id: &str) -> Result<(), PerchError> {
        let device_code = self
            .by_user_code
            .get(user_code)
            .map(|e| e.value().clone())
            .ok_or_else(|| PerchError::InvalidRequest("unknown or expired user code".to_string()))?;

        // Reject expired flows before minting anything so no orphaned
        // token row is left behind when the approval is too late.
        let live = self
            .pending
            .get(&device_code)
            .map(|flow| flow.started.elapsed() < self.ttl)
            .unwrap_or(false);
        if !live {
            self.remove(&device_code);
            return Err(PerchError::InvalidRequest(
                "unknown or expired user code".to_string(),
            ));
        }

        let token = generate_pat();
        self.storage
            .insert_pat(&hash_token(&token), account_id, "device flow")
            .await?;

        match self.pending.get_mut(&device_code) {
            Some(mut flow) if flow.started.elapsed() < self.ttl => {
                flow.token = Some(token);
            }
            _ => {
                return Err(PerchError::InvalidRequest(
                    "unknown or expired user code".to_string(),
                ));
            }
        }

        info!(user_id = %account_id, "device flow approved");
        Ok(())
    }

    /// Poll a device code. A ready token is handed out exactly once and
    /// the flow entry removed.
    pub fn poll(&self, device_code: &str) -> Result<PollOutcome, PerchError> {
        let expired = match self.pending.get(device_code) {
            Some(flow) => flow.started.elapsed() >= self.ttl,
            None => {
                return Err(PerchError::InvalidRequest(
                    "unknown or expired device code".to_string(),
                ));
            }
        };
        if expired {
            self.remove(device_code);
            return Err(PerchError::InvalidRequest(
                "unknown or expired device code".to_string(),
            ));
        }

        let ready = self
            .pending
            .get(device_code)
            .map(|flow| flow.token.is_some())
            .unwrap_or(false);
        if !ready {
            return Ok(PollOutcome::Pending);
        }

        match self.remove(device_code).and_then(|f| f.token) {
            Some(token) => Ok(PollOutcome::Ready { token }),
            None => Ok(PollOutcome::Pending),
        }
    }

    fn remove(&self, device_code: &str) -> Option<PendingFlow> {
        let removed = self.pending.remove(device_code).map(|(_, f)| f);
        if let Some(ref flow) = removed {
            self.by_user_code.remove(&flow.user_code);
        }
        removed
    }

    /// Drop entries past their TTL. Called opportunistically from
    /// `start`; expired entries are also rejected on access.
    fn sweep_expired(&self) {
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().started.elapsed() >= self.ttl)
            .map(|e| e.key().clone())
            .collect();
        for code in stale {
            self.remove(&code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_config::model::StorageConfig;
    use perch_core::StorageAdapter;
    use perch_storage::SqliteStorage;
    use tempfile::tempdir;

    async fn storage(dir: &tempfile::TempDir) -> Arc<dyn StorageAdapter> {
        let path = dir.path().join("device.db");
        let s = SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
        });
        s.initialize().await.unwrap();
        Arc::new(s)
    }

    #[tokio::test]
    async fn full_flow_yields_token_once() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;
        storage
            .get_or_create_account("user-1", "u@example.com", 0)
            .await
            .unwrap();

        let flow = DeviceFlow::new(storage.clone(), 600);
        let codes = flow.start();

        assert_eq!(flow.poll(&codes.device_code).unwrap(), PollOutcome::Pending);

        flow.approve(&codes.user_code, "user-1").await.unwrap();
        let token = match flow.poll(&codes.device_code).unwrap() {
            PollOutcome::Ready { token } => token,
            other => panic!("expected ready, got {other:?}"),
        };
        assert!(token.starts_with("pat_"));

        // The token was persisted and resolves to the approver.
        let owner = storage
            .account_for_pat(&hash_token(&token))
            .await
            .unwrap();
        assert_eq!(owner.as_deref(), Some("user-1"));

        // A second poll does not hand the token out again.
        assert!(flow.poll(&codes.device_code).is_err());
    }

    #[tokio::test]
    async fn unknown_codes_are_rejected() {
        let dir = tempdir().unwrap();
        let flow = DeviceFlow::new(storage(&dir).await, 600);

        assert!(flow.poll("dev_nope").is_err());
        assert!(flow.approve("WRONGCODE", "user-1").await.is_err());
    }

    #[tokio::test]
    async fn expired_flow_is_rejected() {
        let dir = tempdir().unwrap();
        let flow = DeviceFlow::new(storage(&dir).await, 0);
        let codes = flow.start();
        assert!(flow.poll(&codes.device_code).is_err());
    }

    #[tokio::test]
    async fn late_approval_mints_no_token() {
        // Uninitialized storage turns any persistence attempt into a
        // storage error, so an invalid_request here proves the expired
        // approval never reached insert_pat.
        let storage: Arc<dyn StorageAdapter> = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: "unused.db".to_string(),
        }));
        let flow = DeviceFlow::new(storage, 0);
        let codes = flow.start();

        let err = flow.approve(&codes.user_code, "user-1").await.unwrap_err();
        assert!(matches!(err, PerchError::InvalidRequest(_)));
    }

    #[test]
    fn user_codes_avoid_lookalikes() {
        for _ in 0..50 {
            let code = random_user_code();
            assert_eq!(code.len(), 8);
            assert!(!code.contains(['0', 'O', '1', 'I', 'U', 'E', 'A']));
        }
    }
}
