// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    queued_starting = { TaskStatus::Queued, TaskStatus::Starting, true },
    starting_in_progress = { TaskStatus::Starting, TaskStatus::InProgress, true },
    starting_requeue = { TaskStatus::Starting, TaskStatus::Queued, true },
    in_progress_done = { TaskStatus::InProgress, TaskStatus::Done, true },
    in_progress_blocked = { TaskStatus::InProgress, TaskStatus::Blocked, true },
    in_progress_escalated = { TaskStatus::InProgress, TaskStatus::Escalated, true },
    in_progress_requeue = { TaskStatus::InProgress, TaskStatus::Queued, true },
    blocked_requeue = { TaskStatus::Blocked, TaskStatus::Queued, true },
    queued_done = { TaskStatus::Queued, TaskStatus::Done, false },
    queued_in_progress = { TaskStatus::Queued, TaskStatus::InProgress, false },
    done_anything = { TaskStatus::Done, TaskStatus::Queued, false },
    escalated_anything = { TaskStatus::Escalated, TaskStatus::Queued, false },
    blocked_done = { TaskStatus::Blocked, TaskStatus::Done, false },
)]
fn transition_graph(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(TaskStatus::can_transition(from, to), allowed);
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Done.is_terminal());
    assert!(TaskStatus::Escalated.is_terminal());
    assert!(!TaskStatus::Blocked.is_terminal());
    assert!(!TaskStatus::InProgress.is_terminal());
}

#[test]
fn status_serializes_kebab_case() {
    assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in-progress\"");
    let parsed: TaskStatus = serde_json::from_str("\"in-progress\"").unwrap();
    assert_eq!(parsed, TaskStatus::InProgress);
}

#[yare::parameterized(
    band0 = { 0, 1 },
    band1 = { 1, 2 },
    band3 = { 3, 4 },
)]
fn priority_band_turns(band: u8, turns: u32) {
    assert_eq!(PriorityBand(band).turns(), turns);
}

#[test]
fn priority_band_clamps() {
    assert_eq!(PriorityBand::clamped(9), PriorityBand(3));
    assert_eq!(PriorityBand::clamped(2), PriorityBand(2));
}

#[test]
fn session_id_invariant() {
    let mut task = TaskRecord::new("tasks/ralph-319.json", "3mdistal/ralph", "3mdistal/ralph#319");
    task.check_invariants().unwrap();

    task.status = TaskStatus::InProgress;
    task.session_id = "sess-1".to_string();
    task.check_invariants().unwrap();

    task.status = TaskStatus::Done;
    assert!(task.check_invariants().is_err());

    task.clear_session_fields();
    task.check_invariants().unwrap();
    assert!(task.worktree_path.is_empty());
}

#[test]
fn unknown_fields_roundtrip_through_extra() {
    let json = serde_json::json!({
        "_path": "tasks/a.json",
        "_name": "a.json",
        "type": "issue",
        "repo": "o/r",
        "issue": "o/r#7",
        "status": "queued",
        "priority": 2,
        "custom-field": {"nested": true},
        "another": 42,
    });
    let task: TaskRecord = serde_json::from_value(json.clone()).unwrap();
    assert_eq!(task.priority, PriorityBand(2));
    assert_eq!(task.extra.get("custom-field").unwrap()["nested"], true);

    let back = serde_json::to_value(&task).unwrap();
    assert_eq!(back["custom-field"], json["custom-field"]);
    assert_eq!(back["another"], 42);
    assert_eq!(back["_path"], "tasks/a.json");
}

#[test]
fn worktree_root_comparison_canonicalizes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");
    std::fs::create_dir_all(&root).unwrap();
    let dotted = root.join(".");
    assert!(worktree_equals_repo_root(&dotted, &root));

    let elsewhere = dir.path().join("worktrees").join("wt-1");
    assert!(!worktree_equals_repo_root(&elsewhere, &root));
}
