//! Integration tests for the metascope CLI with real databases.
//!
//! These tests verify the CLI captures snapshots from live database connections.
//! Run with: `cargo test -p metascope-cli --features integration-tests`
//!
//! These tests are behind the `integration-tests` feature flag and won't run
//! with regular `cargo test`.

#![cfg(feature = "integration-tests")]

mod sqlite;

use std::process::{Command, Output};

/// Run the metascope CLI with the given arguments and return the output.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_metascope"))
        .args(args)
        .env_remove("DATABASE_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute metascope CLI")
}

/// Run the metascope CLI and assert it succeeds.
pub fn run_cli_success(args: &[&str]) -> Output {
    let output = run_cli(args);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!(
            "CLI failed with status {:?}\nstderr: {}\nstdout: {}",
            output.status.code(),
            stderr,
            stdout
        );
    }
    output
}

/// Parse stdout as a snapshot document.
pub fn snapshot_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "Expected valid JSON output, but parsing failed: {}\nOutput was: {}",
            e, stdout
        )
    })
}

/// Find a table in the snapshot by name.
pub fn table<'a>(snapshot: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    snapshot["tables"]
        .as_array()
        .and_then(|tables| tables.iter().find(|t| t["name"] == name))
        .unwrap_or_else(|| panic!("table '{name}' missing from snapshot: {snapshot}"))
}

/// Table names in snapshot order.
pub fn table_names(snapshot: &serde_json::Value) -> Vec<String> {
    snapshot["tables"]
        .as_array()
        .map(|tables| {
            tables
                .iter()
                .filter_map(|t| t["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
