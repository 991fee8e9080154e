// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn missing_file_defaults_to_running() {
    let dir = tempfile::tempdir().unwrap();
    let file = ControlFile::load(&dir.path().join("control.json")).unwrap();
    assert_eq!(file.mode, DaemonMode::Running);
    assert_eq!(file.version, 1);
}

#[test]
fn parses_full_control_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "version": 1,
            "mode": "draining",
            "pause_requested": true,
            "drain_timeout_ms": 5000,
            "default_profile": "backup",
        })
        .to_string(),
    )
    .unwrap();

    let file = ControlFile::load(&path).unwrap();
    assert_eq!(file.mode, DaemonMode::Draining);
    assert_eq!(file.pause_requested, Some(true));
    assert_eq!(file.drain_timeout(), std::time::Duration::from_millis(5000));
    assert_eq!(file.default_profile.as_deref(), Some("backup"));
}

#[test]
fn malformed_file_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.json");
    std::fs::write(&path, b"{nope").unwrap();
    assert!(ControlFile::load(&path).is_none());

    std::fs::write(&path, serde_json::json!({"mode": "warp"}).to_string()).unwrap();
    assert!(ControlFile::load(&path).is_none(), "unknown mode is malformed");
}

#[test]
fn write_then_load_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.json");
    let file = ControlFile {
        mode: DaemonMode::Paused,
        pause_requested: Some(true),
        ..ControlFile::default()
    };
    file.write(&path).unwrap();
    assert_eq!(ControlFile::load(&path).unwrap(), file);
}

#[tokio::test]
async fn watcher_observes_mode_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.json");
    ControlFile::default().write(&path).unwrap();

    let (mut rx, handle) =
        spawn_control_watcher(path.clone(), std::time::Duration::from_millis(20));
    assert_eq!(rx.borrow().mode, DaemonMode::Running);

    ControlFile { mode: DaemonMode::Paused, ..ControlFile::default() }
        .write(&path)
        .unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(2), rx.changed())
        .await
        .expect("watcher noticed the change")
        .unwrap();
    assert_eq!(rx.borrow().mode, DaemonMode::Paused);
    handle.abort();
}

#[tokio::test]
async fn watcher_keeps_last_good_state_through_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("control.json");
    ControlFile { mode: DaemonMode::Draining, ..ControlFile::default() }
        .write(&path)
        .unwrap();

    let (rx, handle) =
        spawn_control_watcher(path.clone(), std::time::Duration::from_millis(20));
    std::fs::write(&path, b"{corrupted").unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(rx.borrow().mode, DaemonMode::Draining, "garbage did not clobber state");
    handle.abort();
}
