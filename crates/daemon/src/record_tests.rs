// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn roundtrips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon-registry.json");
    let record = DaemonRecord::for_current_process(
        "daemon-1",
        "2026-08-01T10:00:00Z",
        dir.path(),
        &dir.path().join("control.json"),
    );
    record.write(&path).unwrap();

    let loaded = DaemonRecord::read(&path).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.pid, std::process::id());
    assert_eq!(loaded.heartbeat_at, "2026-08-01T10:00:00Z");
}

#[test]
fn heartbeat_updates_only_the_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon-registry.json");
    let mut record = DaemonRecord::for_current_process(
        "daemon-1",
        "2026-08-01T10:00:00Z",
        dir.path(),
        &dir.path().join("control.json"),
    );
    record.write(&path).unwrap();
    record.heartbeat(&path, "2026-08-01T10:05:00Z").unwrap();

    let loaded = DaemonRecord::read(&path).unwrap().unwrap();
    assert_eq!(loaded.heartbeat_at, "2026-08-01T10:05:00Z");
    assert_eq!(loaded.started_at, "2026-08-01T10:00:00Z");
}

#[test]
fn missing_record_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DaemonRecord::read(&dir.path().join("nope.json")).unwrap().is_none());
}

#[test]
fn remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon-registry.json");
    DaemonRecord::remove(&path);
    let record = DaemonRecord::for_current_process("d", "t", dir.path(), &path);
    record.write(&path).unwrap();
    DaemonRecord::remove(&path);
    assert!(!path.exists());
    DaemonRecord::remove(&path);
}
