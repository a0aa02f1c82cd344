//! SQLite integration tests for the metascope CLI.
//!
//! These tests create temporary SQLite databases and verify the CLI
//! captures their structure.

use rusqlite::Connection;
use serde_json::json;
use tempfile::tempdir;

use crate::{run_cli, run_cli_success, snapshot_json, table, table_names};

/// Create a test SQLite database with sample tables.
fn create_test_db(path: &std::path::Path) {
    let conn = Connection::open(path).expect("open sqlite db");

    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE
        );

        CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            total REAL NOT NULL,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_orders_user ON orders(user_id);

        CREATE TABLE order_items (
            id INTEGER PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES orders(id),
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            price REAL NOT NULL
        );

        CREATE TABLE audit_log (
            entry TEXT
        );

        CREATE VIEW user_totals AS
            SELECT u.name, SUM(o.total) AS total
            FROM users u JOIN orders o ON o.user_id = u.id
            GROUP BY u.name;
        "#,
    )
    .expect("create test tables");
}

fn sqlite_url(path: &std::path::Path) -> String {
    format!("sqlite://{}", path.display())
}

#[test]
fn test_sqlite_snapshot_json() {
    let dir = tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    create_test_db(&db_path);

    let output = run_cli_success(&[&sqlite_url(&db_path), "-f", "json"]);
    let snapshot = snapshot_json(&output);

    assert_eq!(snapshot["backend"], "sqlite");
    assert_eq!(
        table_names(&snapshot),
        vec!["audit_log", "order_items", "orders", "user_totals", "users"]
    );

    let users = table(&snapshot, "users");
    assert_eq!(users["kind"], "TABLE");
    assert_eq!(users["schema"], "main");
    let columns: Vec<&str> = users["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(columns, vec!["id", "name", "email"]);
    assert_eq!(users["columns"][1]["nullable"], false);
    assert_eq!(users["columns"][2]["nullable"], true);
    assert_eq!(users["primaryKey"]["columns"], json!(["id"]));
    assert_eq!(users["uniqueConstraints"], json!(["sqlite_autoindex_users_1"]));

    let view = table(&snapshot, "user_totals");
    assert_eq!(view["kind"], "VIEW");
    assert!(view.get("primaryKey").is_none());
}

#[test]
fn test_sqlite_foreign_keys_and_indexes() {
    let dir = tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    create_test_db(&db_path);

    let output = run_cli_success(&[&sqlite_url(&db_path), "-f", "json", "--compact"]);
    let snapshot = snapshot_json(&output);

    let orders = table(&snapshot, "orders");
    let foreign_keys = orders["foreignKeys"].as_array().expect("foreign keys");
    assert_eq!(foreign_keys.len(), 1);
    assert_eq!(foreign_keys[0]["columns"], json!(["user_id"]));
    assert_eq!(foreign_keys[0]["referencedTable"], "users");
    assert_eq!(foreign_keys[0]["referencedColumns"], json!(["id"]));
    assert_eq!(foreign_keys[0]["onDelete"], "CASCADE");
    assert_eq!(foreign_keys[0]["onUpdate"], "NO_ACTION");

    let index = orders["indexes"]
        .as_array()
        .expect("indexes")
        .iter()
        .find(|index| index["name"] == "idx_orders_user")
        .expect("idx_orders_user");
    assert_eq!(index["unique"], false);
    assert_eq!(index["columns"], json!(["user_id"]));

    let order_items = table(&snapshot, "order_items");
    assert_eq!(order_items["foreignKeys"][0]["referencedTable"], "orders");
    assert!(table(&snapshot, "audit_log").get("foreignKeys").is_none());
}

#[test]
fn test_sqlite_named_tables_and_types() {
    let dir = tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    create_test_db(&db_path);
    let url = sqlite_url(&db_path);

    let output = run_cli_success(&[&url, "-f", "json", "-t", "orders", "-t", "users"]);
    assert_eq!(
        table_names(&snapshot_json(&output)),
        vec!["orders", "users"]
    );

    let output = run_cli_success(&[&url, "-f", "json", "--types", "VIEW"]);
    assert_eq!(table_names(&snapshot_json(&output)), vec!["user_totals"]);
}

#[test]
fn test_sqlite_stats_and_output_file() {
    let dir = tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    let out_path = dir.path().join("snapshot.json");
    create_test_db(&db_path);

    let output = run_cli_success(&[
        &sqlite_url(&db_path),
        "-f",
        "json",
        "-o",
        out_path.to_str().expect("utf-8 path"),
        "--stats",
    ]);
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("getColumns"), "stderr: {stderr}");
    assert!(stderr.contains("getImportedKeys"), "stderr: {stderr}");

    let written = std::fs::read_to_string(&out_path).expect("read snapshot file");
    let snapshot: serde_json::Value = serde_json::from_str(&written).expect("valid json");
    assert_eq!(snapshot["tables"].as_array().map(Vec::len), Some(5));
}

#[test]
fn test_sqlite_table_format() {
    let dir = tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    create_test_db(&db_path);

    let output = run_cli_success(&[&sqlite_url(&db_path)]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Schema Snapshot (sqlite)"), "{stdout}");
    assert!(stdout.contains("main.orders (TABLE)"), "{stdout}");
    assert!(stdout.contains("FK users.id"), "{stdout}");
}

#[test]
fn test_unsupported_backend_is_config_error() {
    let output = run_cli(&["jdbc:oracle:thin:@localhost:1521/xe"]);
    assert_eq!(output.status.code(), Some(66));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("backend 'oracle'"), "stderr: {stderr}");
}

#[test]
fn test_missing_database_is_failure() {
    let dir = tempdir().expect("create temp dir");
    let missing = dir.path().join("missing").join("nope.db");

    let output = run_cli(&[&sqlite_url(&missing)]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to connect"), "stderr: {stderr}");
}
