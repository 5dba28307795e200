use rusqlite::Connection;
use stockwatch_core::db::migrations::latest_version;
use stockwatch_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "items");
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "project_items");
    assert_table_exists(&conn, "alerts");
    assert_table_exists(&conn, "push_destinations");
}

#[test]
fn reopening_file_database_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stockwatch.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO items (uuid, name, quantity) VALUES ('a0a0a0a0-0000-4000-8000-000000000001', 'Bolt', 3);",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deleting_an_item_cascades_to_links_and_alerts() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO items (uuid, name, quantity) VALUES ('item-1', 'Servo', 2);
         INSERT INTO projects (uuid, name, status, priority)
             VALUES ('project-1', 'Arm', 'active', 'high');
         INSERT INTO project_items (project_uuid, item_uuid, quantity) VALUES ('project-1', 'item-1', 2);
         INSERT INTO alerts (uuid, item_uuid, threshold) VALUES ('alert-1', 'item-1', 5);
         DELETE FROM items WHERE uuid = 'item-1';",
    )
    .unwrap();

    assert_eq!(row_count(&conn, "project_items"), 0);
    assert_eq!(row_count(&conn, "alerts"), 0);
    assert_eq!(row_count(&conn, "projects"), 1);
}

#[test]
fn schema_rejects_out_of_range_values() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO items (uuid, name, quantity) VALUES ('item-1', 'Servo', 2);
         INSERT INTO projects (uuid, name, status, priority)
             VALUES ('project-1', 'Arm', 'active', 'high');",
    )
    .unwrap();

    assert!(conn
        .execute(
            "INSERT INTO projects (uuid, name, status, priority) VALUES ('p2', 'X', 'archived', 'high');",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO project_items (project_uuid, item_uuid, quantity) VALUES ('project-1', 'item-1', 0);",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO alerts (uuid, item_uuid, threshold) VALUES ('a1', 'item-1', -1);",
            [],
        )
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
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
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
