// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync run insert, status transition, and latest-run lookup.

use std::str::FromStr;

use perch_core::types::{SyncJobRun, SyncRunStatus};
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;
use crate::queries::decode_err;

fn row_to_run(row: &rusqlite::Row<'_>) -> Result<SyncJobRun, rusqlite::Error> {
    let status_str: String = row.get(3)?;
    Ok(SyncJobRun {
        id: row.get(0)?,
        account_id: row.get(1)?,
        forced: row.get(2)?,
        status: SyncRunStatus::from_str(&status_str).map_err(|e| decode_err(3, e))?,
        started_at: row.get(4)?,
        completed_at: row.get(5)?,
        items_collected: row.get(6)?,
        error: row.get(7)?,
    })
}

/// Insert a new run (normally in queued or running state).
pub async fn insert(db: &Database, run: &SyncJobRun) -> Result<(), PerchError> {
    let run = run.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sync_runs
                 (id, account_id, forced, status, started_at, completed_at,
                  items_collected, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    run.id,
                    run.account_id,
                    run.forced,
                    run.status.to_string(),
                    run.started_at,
                    run.completed_at,
                    run.items_collected,
                    run.error,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a run to a new status.
pub async fn update(
    db: &Database,
    id: &str,
    status: SyncRunStatus,
    completed_at: Option<&str>,
    items_collected: u32,
    error: Option<&str>,
) -> Result<(), PerchError> {
    let id = id.to_string();
    let completed_at = completed_at.map(|s| s.to_string());
    let error = error.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sync_runs
                 SET status = ?2, completed_at = ?3, items_collected = ?4, error = ?5
                 WHERE id = ?1",
                params![id, status.to_string(), completed_at, items_collected, error],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recently started run for an account, if any.
pub async fn latest_for_account(
    db: &Database,
    account_id: &str,
) -> Result<Option<SyncJobRun>, PerchError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, forced, status, started_at, completed_at,
                        items_collected, error
                 FROM sync_runs WHERE account_id = ?1
                 ORDER BY started_at DESC LIMIT 1",
            )?;
            match stmt.query_row(params![account_id], row_to_run) {
                Ok(run) => Ok(Some(run)),
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

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_run(id: &str, account_id: &str, started_at: &str) -> SyncJobRun {
        SyncJobRun {
            id: id.to_string(),
            account_id: account_id.to_string(),
            forced: false,
            status: SyncRunStatus::Running,
            started_at: started_at.to_string(),
            completed_at: None,
            items_collected: 0,
            error: None,
        }
    }

    #[tokio::test]
    async fn insert_and_latest_round_trips() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_run("r1", "acct", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        insert(&db, &make_run("r2", "acct", "2026-01-01T01:00:00.000Z"))
            .await
            .unwrap();

        let latest = latest_for_account(&db, "acct").await.unwrap().unwrap();
        assert_eq!(latest.id, "r2");
        assert_eq!(latest.status, SyncRunStatus::Running);
    }

    #[tokio::test]
    async fn update_transitions_to_terminal() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_run("r1", "acct", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        update(
            &db,
            "r1",
            SyncRunStatus::Completed,
            Some("2026-01-01T00:01:00.000Z"),
            42,
            None,
        )
        .await
        .unwrap();

        let run = latest_for_account(&db, "acct").await.unwrap().unwrap();
        assert_eq!(run.status, SyncRunStatus::Completed);
        assert_eq!(run.items_collected, 42);
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn latest_for_unknown_account_is_none() {
        let (db, _dir) = setup_db().await;
        assert!(latest_for_account(&db, "nobody").await.unwrap().is_none());
    }
}
