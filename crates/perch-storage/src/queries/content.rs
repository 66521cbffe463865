// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content item and summary storage.
//!
//! Payloads are opaque: raw JSON is stored as text and parsed back on
//! read; only freshness (collected_at) and the data_type slug carry
//! meaning for the protocol.

use std::str::FromStr;

use perch_core::types::{ContentItem, ContentSummary, SummaryPeriod};
use perch_core::PerchError;
use rusqlite::params;

use crate::database::Database;
use crate::queries::decode_err;

fn row_to_item(row: &rusqlite::Row<'_>) -> Result<ContentItem, rusqlite::Error> {
    let raw_json: Option<String> = row.get(4)?;
    let raw = match raw_json {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| decode_err(4, e))?),
        None => None,
    };
    Ok(ContentItem {
        id: row.get(0)?,
        account_id: row.get(1)?,
        data_type: row.get(2)?,
        text: row.get(3)?,
        raw,
        collected_at: row.get(5)?,
    })
}

const ITEM_COLUMNS: &str = "id, account_id, data_type, text, raw, collected_at";

/// Insert a collected item.
pub async fn insert_item(db: &Database, item: &ContentItem) -> Result<(), PerchError> {
    let raw_json = match &item.raw {
        Some(v) => Some(serde_json::to_string(v).map_err(|e| PerchError::Storage {
            source: Box::new(e),
        })?),
        None => None,
    };
    let item = item.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO content_items
                 (id, account_id, data_type, text, raw, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.id,
                    item.account_id,
                    item.data_type,
                    item.text,
                    raw_json,
                    item.collected_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Items collected at or after `since`, newest first.
pub async fn recent(
    db: &Database,
    account_id: &str,
    since: &str,
    limit: u32,
) -> Result<Vec<ContentItem>, PerchError> {
    let account_id = account_id.to_string();
    let since = since.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM content_items
                 WHERE account_id = ?1 AND collected_at >= ?2
                 ORDER BY collected_at DESC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![account_id, since, limit], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Substring match over item text, newest first.
pub async fn search(
    db: &Database,
    account_id: &str,
    query: &str,
    limit: u32,
) -> Result<Vec<ContentItem>, PerchError> {
    let account_id = account_id.to_string();
    // Escape LIKE metacharacters so a literal % or _ in the query
    // matches itself.
    let pattern = format!(
        "%{}%",
        query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM content_items
                 WHERE account_id = ?1 AND text LIKE ?2 ESCAPE '\\'
                 ORDER BY collected_at DESC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![account_id, pattern, limit], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a generated summary.
pub async fn put_summary(db: &Database, summary: &ContentSummary) -> Result<(), PerchError> {
    let summary = summary.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO content_summaries
                 (id, account_id, period, body, item_count, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    summary.id,
                    summary.account_id,
                    summary.period.to_string(),
                    summary.body,
                    summary.item_count,
                    summary.generated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Latest stored summary for (account, period), if any.
pub async fn latest_summary(
    db: &Database,
    account_id: &str,
    period: SummaryPeriod,
) -> Result<Option<ContentSummary>, PerchError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, period, body, item_count, generated_at
                 FROM content_summaries WHERE account_id = ?1 AND period = ?2
                 ORDER BY generated_at DESC LIMIT 1",
            )?;
            let result = stmt.query_row(params![account_id, period.to_string()], |row| {
                let period_str: String = row.get(2)?;
                Ok(ContentSummary {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    period: SummaryPeriod::from_str(&period_str)
                        .map_err(|e| decode_err(2, e))?,
                    body: row.get(3)?,
                    item_count: row.get(4)?,
                    generated_at: row.get(5)?,
                })
            });
            match result {
                Ok(summary) => Ok(Some(summary)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Distinct data types with at least one stored item for the account.
pub async fn populated_data_types(
    db: &Database,
    account_id: &str,
) -> Result<Vec<String>, PerchError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT data_type FROM content_items
                 WHERE account_id = ?1 ORDER BY data_type",
            )?;
            let rows = stmt.query_map(params![account_id], |row| row.get(0))?;
            let mut types = Vec::new();
            for row in rows {
                types.push(row?);
            }
            Ok(types)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
