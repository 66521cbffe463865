// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity family.

pub mod accounts;
pub mod content;
pub mod grants;
pub mod jobs;
pub mod pats;
pub mod sync_runs;
pub mod watches;

/// Wrap a column decode failure (enum parse, JSON parse) as a rusqlite
/// error so it propagates through `query_row`/`query_map` closures.
pub(crate) fn decode_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
