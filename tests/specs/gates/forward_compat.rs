//! Forward-compatibility specs for the durable store.
//!
//! Readable-forward schemas serve data read-only with exit 0; anything
//! beyond the supported range exits 2 with a structured envelope.

use crate::prelude::*;
use ralph_storage::{RunRecord, StateStore, MAX_SUPPORTED_SCHEMA, MAX_WRITABLE_SCHEMA};

fn seed_store(root: &ControlRoot) {
    std::fs::create_dir_all(root.root()).unwrap();
    let store = StateStore::open_writable(&root.db_path()).unwrap();
    store
        .create_run(&RunRecord {
            id: "run-1".to_string(),
            repo: "acme/app".to_string(),
            issue_number: 42,
            task_ref: "tasks/app-42".to_string(),
            attempt_kind: "issue".to_string(),
            started_at_ms: 1_000,
            completed_at_ms: None,
            outcome: None,
            tokens: None,
        })
        .unwrap();
}

fn set_version(root: &ControlRoot, version: i64) {
    let conn = rusqlite::Connection::open(root.db_path()).unwrap();
    conn.execute("UPDATE schema_version SET version = ?1", rusqlite::params![version]).unwrap();
}

#[test]
fn readable_forward_schema_serves_data_with_exit_0() {
    let root = ControlRoot::new();
    seed_store(&root);
    set_version(&root, MAX_WRITABLE_SCHEMA + 1);

    let out = root.ralph().args(&["gates", "acme/app", "42", "--json"]).passes();
    let value = out.json();
    assert_eq!(value["runId"], "run-1");
    assert!(value["error"].is_null());
}

#[test]
fn forward_incompatible_schema_exits_2_with_envelope() {
    let root = ControlRoot::new();
    seed_store(&root);
    set_version(&root, MAX_SUPPORTED_SCHEMA + 1);

    let out = root.ralph().args(&["gates", "acme/app", "42", "--json"]).exits(2);
    let value = out.json();
    assert_eq!(value["version"], 2);
    assert_eq!(value["error"]["code"], "forward_incompatible");
    assert_eq!(value["error"]["schemaVersion"], MAX_SUPPORTED_SCHEMA + 1);
    assert_eq!(value["error"]["supportedRange"][1], MAX_SUPPORTED_SCHEMA);
    assert_eq!(value["error"]["writableRange"][1], MAX_WRITABLE_SCHEMA);
}

#[test]
fn forward_incompatible_text_output_names_the_code() {
    let root = ControlRoot::new();
    seed_store(&root);
    set_version(&root, MAX_SUPPORTED_SCHEMA + 1);

    root.ralph()
        .args(&["gates", "acme/app", "42"])
        .exits(2)
        .stdout_has("forward_incompatible");
}
