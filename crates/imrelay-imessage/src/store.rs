// SPDX-FileCopyrightText: 2026 Imrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to the Messages `chat.db` database.
//!
//! The database is owned by Messages.app; it is opened with
//! `SQLITE_OPEN_READ_ONLY` and never written. All queries go through the
//! single tokio-rusqlite background thread.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use imrelay_core::{AdapterKind, HealthStatus, MessageStore, Record, RelayAdapter, RelayError};
use rusqlite::OpenFlags;
use tracing::debug;

/// Convert a tokio-rusqlite error into RelayError::Store.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RelayError {
    RelayError::store(e)
}

/// `?, ?, ?` for an `IN (...)` clause of `n` parameters.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// [`MessageStore`] over a local `chat.db`.
pub struct ChatDbStore {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl ChatDbStore {
    /// Opens the database at `path` read-only.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio_rusqlite::Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(RelayError::store)?;

        debug!(path = %path.display(), "opened chat database");
        Ok(Self { conn, path })
    }

    /// Path the store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RelayAdapter for ChatDbStore {
    fn name(&self) -> &str {
        "chat.db"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let result = self
            .conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM chat", [], |row| row.get(0))
            })
            .await;

        Ok(match result {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(format!("cannot read chat table: {e}")),
        })
    }
}

#[async_trait]
impl MessageStore for ChatDbStore {
    async fn resolve_self_chats(&self, handles: &[String]) -> Result<Vec<i64>, RelayError> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        let handles = handles.to_vec();

        self.conn
            .call(move |conn| -> Result<Vec<i64>, rusqlite::Error> {
                let sql = format!(
                    "SELECT ROWID FROM chat WHERE chat_identifier IN ({})",
                    placeholders(handles.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(rusqlite::params_from_iter(handles.iter()), |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn max_record_id(&self, chat_ids: &[i64]) -> Result<i64, RelayError> {
        if chat_ids.is_empty() {
            return Ok(0);
        }
        let chat_ids = chat_ids.to_vec();

        self.conn
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                let sql = format!(
                    "SELECT COALESCE(MAX(m.ROWID), 0) FROM message m \
                     JOIN chat_message_join cmj ON cmj.message_id = m.ROWID \
                     WHERE cmj.chat_id IN ({})",
                    placeholders(chat_ids.len())
                );
                conn.query_row(&sql, rusqlite::params_from_iter(chat_ids.iter()), |row| {
                    row.get(0)
                })
            })
            .await
            .map_err(map_tr_err)
    }

    async fn records_after(
        &self,
        chat_ids: &[i64],
        watermark: i64,
    ) -> Result<Vec<Record>, RelayError> {
        if chat_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = chat_ids.to_vec();
        params.push(watermark);

        self.conn
            .call(move |conn| -> Result<Vec<Record>, rusqlite::Error> {
                let sql = format!(
                    "SELECT DISTINCT m.ROWID, m.text, m.attributedBody, m.is_from_me, m.date \
                     FROM message m \
                     JOIN chat_message_join cmj ON cmj.message_id = m.ROWID \
                     WHERE cmj.chat_id IN ({}) AND m.ROWID > ? AND m.is_from_me = 1 \
                     ORDER BY m.ROWID ASC",
                    placeholders(params.len() - 1)
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(Record {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        attributed_body: row.get(2)?,
                        is_from_me: row.get::<_, i64>(3)? != 0,
                        date: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}
