//! SQLite-backed slot storage.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for slot storage.
//! - Apply slot schema migrations before returning a usable store.
//!
//! # Invariants
//! - Returned stores have migrations fully applied.
//! - One row per slot key; writes are upserts.

use super::migrations::apply_migrations;
use super::{KeyValueStore, StorageResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{Duration, Instant};

/// Slot storage persisted in the `kv_slots` table.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a slot database file.
    ///
    /// # Side effects
    /// - Emits `slot_db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let started_at = Instant::now();
        info!("event=slot_db_open module=storage status=start mode=file");
        let result = Connection::open(path)
            .map_err(Into::into)
            .and_then(Self::from_connection);
        log_open_outcome("file", started_at, &result);
        result
    }

    /// Opens a private in-memory slot database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let started_at = Instant::now();
        info!("event=slot_db_open module=storage status=start mode=memory");
        let result = Connection::open_in_memory()
            .map_err(Into::into)
            .and_then(Self::from_connection);
        log_open_outcome("memory", started_at, &result);
        result
    }

    /// Wraps an existing connection after applying migrations.
    pub fn from_connection(mut conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl KeyValueStore for SqliteStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_slots WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv_slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv_slots WHERE key = ?1;", [key])?;
        Ok(())
    }
}

fn log_open_outcome(mode: &str, started_at: Instant, result: &StorageResult<SqliteStore>) {
    match result {
        Ok(_) => info!(
            "event=slot_db_open module=storage status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=slot_db_open module=storage status=error mode={} duration_ms={} error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::storage::KeyValueStore;

    #[test]
    fn in_memory_store_round_trips_slots() {
        let mut store = SqliteStore::open_in_memory().expect("in-memory store should open");
        assert_eq!(store.get_item("bindlist_id").expect("read"), None);

        store.set_item("bindlist_id", "4").expect("write");
        store.set_item("bindlist_id", "5").expect("overwrite");
        assert_eq!(
            store.get_item("bindlist_id").expect("read"),
            Some("5".to_string())
        );

        store.remove_item("bindlist_id").expect("remove");
        assert_eq!(store.get_item("bindlist_id").expect("read"), None);
    }
}
