// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::StateStore;

fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");
    (dir, path)
}

fn set_version(path: &Path, version: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute("UPDATE schema_version SET version = ?1", params![version]).unwrap();
}

#[test]
fn missing_file_probes_ok() {
    let (_dir, path) = temp_db();
    assert_eq!(probe(&path).unwrap(), StoreProbe::Ok { schema_version: 0 });
}

#[test]
fn fresh_store_initializes_to_current_schema() {
    let (_dir, path) = temp_db();
    let _store = StateStore::open_writable(&path).unwrap();
    assert_eq!(probe(&path).unwrap(), StoreProbe::Ok { schema_version: SCHEMA_VERSION });
}

#[test]
fn reopen_is_idempotent() {
    let (_dir, path) = temp_db();
    drop(StateStore::open_writable(&path).unwrap());
    drop(StateStore::open_writable(&path).unwrap());
    assert_eq!(probe(&path).unwrap(), StoreProbe::Ok { schema_version: SCHEMA_VERSION });
}

#[test]
fn readable_forward_schema_classified() {
    let (_dir, path) = temp_db();
    drop(StateStore::open_writable(&path).unwrap());
    set_version(&path, MAX_WRITABLE_SCHEMA + 1);
    assert_eq!(
        probe(&path).unwrap(),
        StoreProbe::ReadableForward { schema_version: MAX_WRITABLE_SCHEMA + 1 }
    );
    // Writable open refuses; read-only open succeeds
    assert!(matches!(
        StateStore::open_writable(&path),
        Err(crate::StoreError::ForwardIncompatible { .. })
    ));
    let store = StateStore::open_read_only(&path).unwrap();
    assert_eq!(store.mode(), crate::StoreMode::ReadOnly);
}

#[test]
fn forward_incompatible_schema_refused_everywhere() {
    let (_dir, path) = temp_db();
    drop(StateStore::open_writable(&path).unwrap());
    set_version(&path, MAX_SUPPORTED_SCHEMA + 5);
    assert_eq!(
        probe(&path).unwrap(),
        StoreProbe::ForwardIncompatible { schema_version: MAX_SUPPORTED_SCHEMA + 5 }
    );
    let err = StateStore::open_read_only(&path).unwrap_err();
    match err {
        crate::StoreError::ForwardIncompatible { schema_version, max_supported, max_writable } => {
            assert_eq!(schema_version, MAX_SUPPORTED_SCHEMA + 5);
            assert_eq!(max_supported, MAX_SUPPORTED_SCHEMA);
            assert_eq!(max_writable, MAX_WRITABLE_SCHEMA);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err_code(&StateStore::open_writable(&path).unwrap_err()), "forward_incompatible");
}

fn err_code(err: &crate::StoreError) -> &'static str {
    err.code()
}

#[test]
fn migration_from_v1_adds_classifier_columns() {
    let (_dir, path) = temp_db();
    // Build a v1 store by hand, then reopen writable to trigger v2.
    {
        let mut conn = Connection::open(&path).unwrap();
        apply_pragmas(&conn).unwrap();
        // Run only the first migration
        super::migrate_v1(&mut conn).unwrap();
        assert_eq!(read_version(&conn).unwrap(), Some(1));
    }
    let store = StateStore::open_writable(&path).unwrap();
    drop(store);
    assert_eq!(probe(&path).unwrap(), StoreProbe::Ok { schema_version: 2 });
    let conn = Connection::open(&path).unwrap();
    // classifier columns exist after the upgrade
    conn.query_row(
        "SELECT classifier_version, classifier_payload FROM run_gates LIMIT 1",
        params![],
        |_| Ok(()),
    )
    .optional()
    .unwrap();
}
