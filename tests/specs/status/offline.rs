//! `status` specs with no daemon listening.

use crate::prelude::*;
use ralph_core::{TaskRecord, TaskStatus};
use ralph_storage::{FsQueueStore, QueueStore};

fn seed_task(root: &ControlRoot, path: &str, status: TaskStatus) {
    let mut task = TaskRecord::new(path, "acme/app", format!("acme/app#{}", path.len()));
    task.status = status;
    if status.allows_session() {
        task.session_id = "sess-1".to_string();
    }
    FsQueueStore::new(root.queue_dir()).put(&task).unwrap();
}

#[test]
fn status_without_daemon_exits_zero() {
    ControlRoot::new()
        .ralph()
        .args(&["status"])
        .passes()
        .stdout_has("daemon: not running");
}

#[test]
fn status_json_reports_not_running() {
    let root = ControlRoot::new();
    let out = root.ralph().args(&["status", "--json"]).passes();
    let value = out.json();
    assert_eq!(value["running"], false);
    assert_eq!(value["mode"], "running");
    assert!(value["error"].is_null());
}

#[test]
fn status_counts_seeded_tasks_per_repo() {
    let root = ControlRoot::new();
    seed_task(&root, "tasks/a", TaskStatus::Queued);
    seed_task(&root, "tasks/bb", TaskStatus::Queued);
    seed_task(&root, "tasks/ccc", TaskStatus::Blocked);

    let out = root.ralph().args(&["status", "--json"]).passes();
    let value = out.json();
    let repo = &value["repos"][0];
    assert_eq!(repo["repo"], "acme/app");
    assert_eq!(repo["queued"], 2);
    assert_eq!(repo["blocked"], 1);
}

#[test]
fn status_reflects_paused_control_file() {
    let root = ControlRoot::new();
    root.file(
        root.control_file(),
        r#"{"version":1,"mode":"paused","pause_requested":true}"#,
    );
    let out = root.ralph().args(&["status", "--json"]).passes();
    assert_eq!(out.json()["mode"], "paused");
}
