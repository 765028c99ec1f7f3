//! SQLite-backed persistent medium

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{Medium, Op};
use crate::error::MediumError;

/// Persistent medium storing every entry as a row of a single table
///
/// [`Medium::apply`] runs inside one transaction, so a chunked write either
/// lands completely or not at all.
pub struct SqliteMedium {
    conn: Mutex<Connection>,
}

impl SqliteMedium {
    /// Open or create a medium at the given database path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MediumError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!(?path, "Opened sqlite medium");
        Self::with_connection(conn)
    }

    /// Create an in-memory medium (for testing)
    pub fn in_memory() -> Result<Self, MediumError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MediumError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO entries (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
}

fn delete(conn: &Connection, key: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM entries WHERE key = ?1", params![key])
}

impl Medium for SqliteMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        let value = self
            .lock()
            .query_row("SELECT value FROM entries WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        upsert(&self.lock(), key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        delete(&self.lock(), key)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn total_size(&self) -> Result<usize, MediumError> {
        let total: i64 = self.lock().query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM entries",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(total).unwrap_or_default())
    }

    fn apply(&self, ops: &[Op]) -> Result<(), MediumError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for op in ops {
            match op {
                Op::Set { key, value } => upsert(&tx, key, value)?,
                Op::Remove { key } => delete(&tx, key)?,
            };
        }
        tx.commit()?;
        debug!(ops = ops.len(), "SqliteMedium::apply: committed");
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        true
    }

    fn flush(&self) -> Result<(), MediumError> {
        self.lock().execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}
