// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account CRUD and balance compare-and-swap.

use std::str::FromStr;

use perch_core::types::{now_iso, Account, PlanTier};
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;
use crate::queries::decode_err;

fn row_to_account(row: &rusqlite::Row<'_>) -> Result<Account, rusqlite::Error> {
    let plan_str: String = row.get(3)?;
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        balance: row.get(2)?,
        plan: PlanTier::from_str(&plan_str).map_err(|e| decode_err(3, e))?,
        created_at: row.get(4)?,
    })
}

/// Fetch an account, creating it with the given starting balance if absent.
pub async fn get_or_create(
    db: &Database,
    id: &str,
    email: &str,
    starting_balance: i64,
) -> Result<Account, PerchError> {
    let id = id.to_string();
    let email = email.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO accounts (id, email, balance, plan, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO NOTHING",
                params![id, email, starting_balance, PlanTier::Free.to_string(), now_iso()],
            )?;
            let mut stmt = conn.prepare(
                "SELECT id, email, balance, plan, created_at FROM accounts WHERE id = ?1",
            )?;
            stmt.query_row(params![id], row_to_account)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an account by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Account>, PerchError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, balance, plan, created_at FROM accounts WHERE id = ?1",
            )?;
            match stmt.query_row(params![id], row_to_account) {
                Ok(account) => Ok(Some(account)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace the balance only if it still equals `expected`.
///
/// Returns false when the guard did not match (another writer raced).
pub async fn compare_and_swap_balance(
    db: &Database,
    id: &str,
    expected: i64,
    new: i64,
) -> Result<bool, PerchError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE accounts SET balance = ?3 WHERE id = ?1 AND balance = ?2",
                params![id, expected, new],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
