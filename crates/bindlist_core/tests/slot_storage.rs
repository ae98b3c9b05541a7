use bindlist_core::storage::migrations::{latest_version, schema_version};
use bindlist_core::{
    FieldSchema, KeyValueStore, Model, Record, SqliteStore, StorageError, StorageKeys,
};
use rusqlite::Connection;

#[test]
fn open_in_memory_applies_all_migrations() {
    let store = SqliteStore::open_in_memory().expect("in-memory store opens");

    assert_eq!(schema_version(store.connection()).expect("version"), latest_version());
    assert_table_exists(store.connection(), "kv_slots");
}

#[test]
fn reopening_same_file_is_idempotent_and_keeps_slots() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bindlist.db");

    let mut first = SqliteStore::open(&path).expect("first open");
    first.set_item("bindlist_id", "3").expect("write");
    drop(first);

    let second = SqliteStore::open(&path).expect("second open");
    assert_eq!(schema_version(second.connection()).expect("version"), latest_version());
    assert_eq!(
        second.get_item("bindlist_id").expect("read").as_deref(),
        Some("3")
    );
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).expect("raw open");
    conn.execute_batch("PRAGMA user_version = 999;")
        .expect("bump version");
    drop(conn);

    match SqliteStore::open(&path) {
        Err(StorageError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must be rejected"),
    }
}

#[test]
fn records_survive_a_restart_through_sqlite_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("catalog.db");

    let mut model = Model::new(
        SqliteStore::open(&path).expect("open"),
        FieldSchema::catalog(),
        StorageKeys::default(),
    );
    model
        .add(
            Record::new()
                .with("author", "Ursula K. Le Guin")
                .with("name", "The Dispossessed")
                .with("year", 1974_i64),
        )
        .expect("valid record");
    model
        .add(Record::new().with("author", "Iain Banks").with("name", "Excession"))
        .expect("valid record");
    let saved = model.store().clone();
    drop(model);

    let restored = Model::new(
        SqliteStore::open(&path).expect("reopen"),
        FieldSchema::catalog(),
        StorageKeys::default(),
    );
    assert_eq!(restored.store(), &saved);
    assert_eq!(restored.counter(), 2);
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .expect("sqlite_master is readable");
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
