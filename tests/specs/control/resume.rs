//! `resume` specs: the control file returns to running.

use crate::prelude::*;

#[test]
fn resume_rewrites_paused_control_file() {
    let root = ControlRoot::new();
    root.file(
        root.control_file(),
        r#"{"version":1,"mode":"paused","pause_requested":true,"pause_at_checkpoint":"2026-07-01T00:00:00Z"}"#,
    );

    root.ralph().args(&["resume"]).passes().stdout_has("resumed");

    let control: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.control_file()).unwrap()).unwrap();
    assert_eq!(control["mode"], "running");
    assert!(control.get("pause_requested").is_none());
    assert!(control.get("pause_at_checkpoint").is_none());
}

#[test]
fn resume_without_control_file_creates_one() {
    let root = ControlRoot::new();
    root.ralph().args(&["resume"]).passes();
    let control: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.control_file()).unwrap()).unwrap();
    assert_eq!(control["version"], 1);
    assert_eq!(control["mode"], "running");
}

#[test]
fn resume_preserves_drain_timeout_setting() {
    let root = ControlRoot::new();
    root.file(
        root.control_file(),
        r#"{"version":1,"mode":"draining","drain_timeout_ms":5000}"#,
    );
    root.ralph().args(&["resume"]).passes();
    let control: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.control_file()).unwrap()).unwrap();
    assert_eq!(control["mode"], "running");
    assert_eq!(control["drain_timeout_ms"], 5000);
}
