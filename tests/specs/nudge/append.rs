//! `nudge` specs: operator messages land in the session's nudge log.

use crate::prelude::*;
use ralph_core::{TaskRecord, TaskStatus};
use ralph_storage::{FsQueueStore, QueueStore};

fn seed_in_progress_task(root: &ControlRoot, session_id: &str) {
    let mut task = TaskRecord::new("tasks/app-42", "acme/app", "acme/app#42");
    task.status = TaskStatus::InProgress;
    task.session_id = session_id.to_string();
    FsQueueStore::new(root.queue_dir()).put(&task).unwrap();
}

#[test]
fn nudge_appends_to_session_log() {
    let root = ControlRoot::new();
    seed_in_progress_task(&root, "sess-1");

    root.ralph()
        .args(&["nudge", "acme/app#42", "try rebasing first"])
        .passes()
        .stdout_has("nudged tasks/app-42");

    let log = std::fs::read_to_string(root.sessions_dir().join("sess-1/nudges.jsonl")).unwrap();
    let record: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(record["type"], "nudge");
    assert_eq!(record["message"], "try rebasing first");
}

#[test]
fn nudge_by_task_path_also_resolves() {
    let root = ControlRoot::new();
    seed_in_progress_task(&root, "sess-1");
    root.ralph().args(&["nudge", "tasks/app-42", "hello"]).passes();
}

#[test]
fn nudge_unknown_task_fails() {
    ControlRoot::new()
        .ralph()
        .args(&["nudge", "acme/app#99", "hello"])
        .fails()
        .stderr_has("no task matches");
}

#[test]
fn nudge_queued_task_fails_without_session() {
    let root = ControlRoot::new();
    let task = TaskRecord::new("tasks/app-42", "acme/app", "acme/app#42");
    FsQueueStore::new(root.queue_dir()).put(&task).unwrap();

    root.ralph()
        .args(&["nudge", "acme/app#42", "hello"])
        .fails()
        .stderr_has("no active session");
}
