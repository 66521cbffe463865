// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watch registration upsert and lookup.

use std::str::FromStr;

use perch_core::types::{BackfillStatus, WatchRegistration, WatchState};
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;
use crate::queries::decode_err;

fn row_to_watch(row: &rusqlite::Row<'_>) -> Result<WatchRegistration, rusqlite::Error> {
    let state_str: String = row.get(1)?;
    let backfill_str: String = row.get(5)?;
    Ok(WatchRegistration {
        account_id: row.get(0)?,
        state: WatchState::from_str(&state_str).map_err(|e| decode_err(1, e))?,
        since: row.get(2)?,
        last_sync: row.get(3)?,
        next_sync: row.get(4)?,
        backfill: BackfillStatus::from_str(&backfill_str).map_err(|e| decode_err(5, e))?,
        backfill_days: row.get(6)?,
        sync_frequency_secs: row.get(7)?,
        retention_until: row.get(8)?,
    })
}

const WATCH_COLUMNS: &str = "account_id, state, since, last_sync, next_sync, backfill, \
                             backfill_days, sync_frequency_secs, retention_until";

/// Get the registration for an account, watching or not.
pub async fn get(
    db: &Database,
    account_id: &str,
) -> Result<Option<WatchRegistration>, PerchError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WATCH_COLUMNS} FROM watch_registrations WHERE account_id = ?1"
            ))?;
            match stmt.query_row(params![account_id], row_to_watch) {
                Ok(watch) => Ok(Some(watch)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or replace the registration for its account.
///
/// One row per account: unwatch and re-watch rewrite the same row.
pub async fn put(db: &Database, reg: &WatchRegistration) -> Result<(), PerchError> {
    let reg = reg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO watch_registrations
                 (account_id, state, since, last_sync, next_sync, backfill,
                  backfill_days, sync_frequency_secs, retention_until)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    reg.account_id,
                    reg.state.to_string(),
                    reg.since,
                    reg.last_sync,
                    reg.next_sync,
                    reg.backfill.to_string(),
                    reg.backfill_days,
                    reg.sync_frequency_secs,
                    reg.retention_until,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All registrations currently watching, ordered by next_sync.
pub async fn list_active(db: &Database) -> Result<Vec<WatchRegistration>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WATCH_COLUMNS} FROM watch_registrations
                 WHERE state = 'watching' ORDER BY next_sync ASC"
            ))?;
            let rows = stmt.query_map([], row_to_watch)?;
            let mut watches = Vec::new();
            for row in rows {
                watches.push(row?);
            }
            Ok(watches)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
