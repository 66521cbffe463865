// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes:
//! the single-writer model is what makes per-account ledger operations
//! linearizable.

use perch_core::PerchError;
use tracing::debug;

/// Convert a tokio-rusqlite error into PerchError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PerchError {
    PerchError::Storage {
        source: Box::new(e),
    }
}

/// A handle to the SQLite database, wrapping the tokio-rusqlite connection.
///
/// Opening runs PRAGMA setup (WAL, foreign keys, busy timeout) and all
/// pending migrations.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub async fn open(path: &str) -> Result<Self, PerchError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| PerchError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| -> Result<(), PerchError> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
            .map_err(|e| PerchError::Storage {
                source: Box::new(e),
            })?;
            crate::migrations::run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(|e| PerchError::Storage {
            source: Box::new(e),
        })?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), PerchError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
