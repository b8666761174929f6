// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements of one process are serialized through tokio-rusqlite's
//! background thread. Cross-process safety comes from SQLite itself: unique
//! indexes plus `BEGIN IMMEDIATE` transactions with a busy timeout.

use std::path::Path;

use handoff_core::HandoffError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Milliseconds a writer waits for another process's lock before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Handle to the engine's SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and
    /// applies pending migrations.
    pub async fn open(path: &str) -> Result<Self, HandoffError> {
        Self::open_with(path, true).await
    }

    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, HandoffError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HandoffError::Storage {
                    source: Box::new(e),
                })?;
        }

        // Migrations need a plain `&mut Connection`; run them once on a
        // short-lived connection before handing the file to the writer thread.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), HandoffError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| HandoffError::Storage {
                    source: Box::new(e),
                })?;
            conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS.into()))
                .map_err(|e| HandoffError::Storage {
                    source: Box::new(e),
                })?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| HandoffError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| HandoffError::Storage {
                source: Box::new(e),
            })?;

        let journal_mode = if wal_mode { "WAL" } else { "DELETE" };
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal_mode};
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
            ))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, journal_mode, "database opened");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

/// Convert a tokio-rusqlite error into [`HandoffError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> HandoffError {
    HandoffError::Storage {
        source: Box::new(e),
    }
}
