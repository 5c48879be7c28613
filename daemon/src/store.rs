use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use js5watch_monitor::{ResetRecord, ResetStore};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed reset time {0:?}: {1}")]
    Time(String, #[source] chrono::ParseError),
    #[error("store worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Reset history in a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS resets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reset_time TEXT NOT NULL,
                reset_time_unix INTEGER NOT NULL,
                uptime_seconds INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resets_time ON resets(reset_time_unix)",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl ResetStore for SqliteStore {
    type Error = StoreError;

    async fn last_reset(&self) -> Result<Option<ResetRecord>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT reset_time, reset_time_unix, uptime_seconds FROM resets
                     ORDER BY reset_time_unix DESC, id DESC LIMIT 1",
                    [],
                    |row| Ok((row.get::<_, String>(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (reset_time, reset_time_unix, uptime_seconds) = match row {
                Some(x) => x,
                None => return Ok(None),
            };
            let reset_time = DateTime::parse_from_rfc3339(&reset_time)
                .map_err(|e| StoreError::Time(reset_time.clone(), e))?
                .with_timezone(&Utc);
            Ok(Some(ResetRecord {
                reset_time,
                reset_time_unix,
                uptime_seconds,
            }))
        })
        .await
    }

    async fn insert_reset(&self, record: &ResetRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO resets (reset_time, reset_time_unix, uptime_seconds)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.reset_time.to_rfc3339(),
                    record.reset_time_unix,
                    record.uptime_seconds
                ],
            )?;
            Ok(())
        })
        .await
    }
}
