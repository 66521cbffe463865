// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Personal-access token storage.
//!
//! Only sha256 hex digests are persisted; the raw token is shown to the
//! caller once at issuance and never stored.

use perch_core::types::now_iso;
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;

/// Store a PAT digest for an account.
pub async fn insert(
    db: &Database,
    token_hash: &str,
    account_id: &str,
    label: &str,
) -> Result<(), PerchError> {
    let token_hash = token_hash.to_string();
    let account_id = account_id.to_string();
    let label = label.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO personal_access_tokens
                 (token_hash, account_id, label, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, account_id, label, now_iso()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Account id owning the PAT with this digest, if any.
pub async fn account_for(
    db: &Database,
    token_hash: &str,
) -> Result<Option<String>, PerchError> {
    let token_hash = token_hash.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT account_id FROM personal_access_tokens WHERE token_hash = ?1",
            )?;
            match stmt.query_row(params![token_hash], |row| row.get(0)) {
                Ok(account_id) => Ok(Some(account_id)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pat_lookup_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        insert(&db, "abc123", "acct-1", "ci token").await.unwrap();
        assert_eq!(
            account_for(&db, "abc123").await.unwrap(),
            Some("acct-1".to_string())
        );
        assert!(account_for(&db, "unknown").await.unwrap().is_none());
    }
}
