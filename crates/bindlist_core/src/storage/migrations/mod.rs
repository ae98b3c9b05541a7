//! Slot table schema steps.
//!
//! # Invariants
//! - Step `n` of `STEPS` upgrades the database to version `n + 1`.
//! - The reached version is stored in `PRAGMA user_version`.
//! - Databases written by a newer build are refused, never downgraded.

use crate::storage::{StorageError, StorageResult};
use log::info;
use rusqlite::Connection;

const STEPS: &[&str] = &[include_str!("0001_kv_slots.sql")];

/// Highest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

/// Schema version recorded in the database file.
pub fn schema_version(conn: &Connection) -> StorageResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Brings the slot schema up to `latest_version` inside one transaction.
///
/// # Errors
/// - `StorageError::UnsupportedSchemaVersion` when the file is newer than
///   this build.
pub fn apply_migrations(conn: &mut Connection) -> StorageResult<()> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(StorageError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending = &STEPS[found as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (offset, sql) in pending.iter().enumerate() {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", found + offset as u32 + 1)?;
    }
    tx.commit()?;

    info!(
        "event=slot_schema_upgrade module=storage status=ok from={} to={}",
        found, latest
    );
    Ok(())
}
