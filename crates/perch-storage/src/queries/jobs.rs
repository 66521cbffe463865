// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job CRUD with JSON-encoded typed metadata.

use std::str::FromStr;

use perch_core::types::{Job, JobFilter, JobStatus};
use perch_core::{MetadataMap, PerchError};
use rusqlite::params;

use crate::database::Database;
use crate::queries::decode_err;

const JOB_COLUMNS: &str = "id, account_id, app, action, cost_estimate, actual_cost, \
                           status, metadata, created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<Job, rusqlite::Error> {
    let status_str: String = row.get(6)?;
    let metadata_json: String = row.get(7)?;
    let metadata: MetadataMap =
        serde_json::from_str(&metadata_json).map_err(|e| decode_err(7, e))?;
    Ok(Job {
        id: row.get(0)?,
        account_id: row.get(1)?,
        app: row.get(2)?,
        action: row.get(3)?,
        cost_estimate: row.get(4)?,
        actual_cost: row.get(5)?,
        status: JobStatus::from_str(&status_str).map_err(|e| decode_err(6, e))?,
        metadata,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn metadata_to_json(metadata: &MetadataMap) -> Result<String, PerchError> {
    serde_json::to_string(metadata).map_err(|e| PerchError::Storage {
        source: Box::new(e),
    })
}

/// Insert a new job.
pub async fn insert(db: &Database, job: &Job) -> Result<(), PerchError> {
    let metadata_json = metadata_to_json(&job.metadata)?;
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs
                 (id, account_id, app, action, cost_estimate, actual_cost,
                  status, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    job.id,
                    job.account_id,
                    job.app,
                    job.action,
                    job.cost_estimate,
                    job.actual_cost,
                    job.status.to_string(),
                    metadata_json,
                    job.created_at,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a job by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Job>, PerchError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_job) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist a settled job (status, actual_cost, merged metadata, updated_at).
pub async fn update(db: &Database, job: &Job) -> Result<(), PerchError> {
    let metadata_json = metadata_to_json(&job.metadata)?;
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs
                 SET status = ?2, actual_cost = ?3, metadata = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    job.id,
                    job.status.to_string(),
                    job.actual_cost,
                    metadata_json,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a job's status only if it is still in `from`. Returns
/// false when no row matched, meaning another writer claimed the job
/// first.
pub async fn transition(
    db: &Database,
    id: &str,
    from: JobStatus,
    to: JobStatus,
    updated_at: &str,
) -> Result<bool, PerchError> {
    let id = id.to_string();
    let updated_at = updated_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = ?4",
                params![id, to.to_string(), updated_at, from.to_string()],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List an account's jobs, newest first, with optional app/status filters.
pub async fn list(
    db: &Database,
    account_id: &str,
    filter: &JobFilter,
) -> Result<Vec<Job>, PerchError> {
    let account_id = account_id.to_string();
    let app = filter.app.clone();
    let status = filter.status.map(|s| s.to_string());
    let limit = filter.limit.unwrap_or(50);
    db.connection()
        .call(move |conn| {
            // Optional filters are folded into the WHERE clause via
            // IS NULL guards so one statement covers all combinations.
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE account_id = ?1
                   AND (?2 IS NULL OR app = ?2)
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY created_at DESC LIMIT ?4"
            ))?;
            let rows = stmt.query_map(params![account_id, app, status, limit], row_to_job)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::MetadataValue;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_job(id: &str, app: &str, status: JobStatus) -> Job {
        let mut metadata = MetadataMap::new();
        metadata.insert("model".to_string(), MetadataValue::Text("sonnet".into()));
        Job {
            id: id.to_string(),
            account_id: "acct".to_string(),
            app: app.to_string(),
            action: "summarize".to_string(),
            cost_estimate: 5,
            actual_cost: None,
            status,
            metadata,
            created_at: format!("2026-01-01T00:00:0{}.000Z", id.len() % 10),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips_metadata() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_job("j1", "digest", JobStatus::Started))
            .await
            .unwrap();

        let job = get(&db, "j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Started);
        assert_eq!(job.cost_estimate, 5);
        assert_eq!(
            job.metadata["model"],
            MetadataValue::Text("sonnet".into())
        );
    }

    #[tokio::test]
    async fn update_persists_settlement() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_job("j1", "digest", JobStatus::Started))
            .await
            .unwrap();

        let mut job = get(&db, "j1").await.unwrap().unwrap();
        job.status = JobStatus::Completed;
        job.actual_cost = Some(3);
        job.metadata
            .insert("tokens".to_string(), MetadataValue::Int(120));
        update(&db, &job).await.unwrap();

        let settled = get(&db, "j1").await.unwrap().unwrap();
        assert_eq!(settled.status, JobStatus::Completed);
        assert_eq!(settled.actual_cost, Some(3));
        assert_eq!(settled.metadata["tokens"], MetadataValue::Int(120));
        assert_eq!(
            settled.metadata["model"],
            MetadataValue::Text("sonnet".into())
        );
    }

    #[tokio::test]
    async fn transition_claims_only_from_expected_status() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_job("j1", "digest", JobStatus::Started))
            .await
            .unwrap();

        let ts = "2026-01-02T00:00:00.000Z";
        let claimed = transition(&db, "j1", JobStatus::Started, JobStatus::Completed, ts)
            .await
            .unwrap();
        assert!(claimed);

        // The job is no longer started, so a second claim loses.
        let second = transition(&db, "j1", JobStatus::Started, JobStatus::Failed, ts)
            .await
            .unwrap();
        assert!(!second);

        let job = get(&db, "j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn list_applies_filters_and_limit() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_job("j1", "digest", JobStatus::Started))
            .await
            .unwrap();
        insert(&db, &make_job("j2", "digest", JobStatus::Completed))
            .await
            .unwrap();
        insert(&db, &make_job("j3", "other", JobStatus::Started))
            .await
            .unwrap();

        let all = list(&db, "acct", &JobFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let digest_only = list(
            &db,
            "acct",
            &JobFilter {
                app: Some("digest".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(digest_only.len(), 2);

        let started_only = list(
            &db,
            "acct",
            &JobFilter {
                status: Some(JobStatus::Started),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(started_only.len(), 2);

        let limited = list(
            &db,
            "acct",
            &JobFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
