// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time starter-credit grants per (account, app).

use perch_core::types::now_iso;
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;

/// Amount already granted for (account, app), or None if never granted.
pub async fn get(
    db: &Database,
    account_id: &str,
    app: &str,
) -> Result<Option<i64>, PerchError> {
    let account_id = account_id.to_string();
    let app = app.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT amount FROM starter_grants WHERE account_id = ?1 AND app = ?2",
            )?;
            match stmt.query_row(params![account_id, app], |row| row.get(0)) {
                Ok(amount) => Ok(Some(amount)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a grant. The (account, app) primary key deduplicates: a
/// repeat insert is ignored and reported as false so callers skip the
/// balance credit.
pub async fn record(
    db: &Database,
    account_id: &str,
    app: &str,
    amount: i64,
) -> Result<bool, PerchError> {
    let account_id = account_id.to_string();
    let app = app.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO starter_grants (account_id, app, amount, granted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![account_id, app, amount, now_iso()],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn grant_round_trips_and_ignores_duplicates() {
        let (db, _dir) = setup_db().await;
        assert!(get(&db, "acct", "digest").await.unwrap().is_none());

        assert!(record(&db, "acct", "digest", 100).await.unwrap());
        assert_eq!(get(&db, "acct", "digest").await.unwrap(), Some(100));

        // Same app again is ignored; another app is a fresh grant.
        assert!(!record(&db, "acct", "digest", 100).await.unwrap());
        assert!(record(&db, "acct", "other", 100).await.unwrap());
    }
}
