// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_core::TaskRecord;
use ralph_storage::MemQueueStore;
use ralph_throttle::WindowSnapshot;

fn task(path: &str, repo: &str, status: TaskStatus) -> TaskRecord {
    let mut task = TaskRecord::new(path, repo, format!("{repo}#1"));
    task.status = status;
    if status.allows_session() {
        task.session_id = "s-1".to_string();
    }
    task
}

#[test]
fn counts_group_by_repo_and_status() {
    let queue = MemQueueStore::with_tasks([
        task("t/1", "acme/app", TaskStatus::Queued),
        task("t/2", "acme/app", TaskStatus::InProgress),
        task("t/3", "acme/app", TaskStatus::Blocked),
        task("t/4", "acme/lib", TaskStatus::Done),
        task("t/5", "acme/lib", TaskStatus::Escalated),
    ]);
    let repos = count_tasks(&queue);
    assert_eq!(repos.len(), 2);
    let app = &repos[0];
    assert_eq!(app.repo, "acme/app");
    assert_eq!((app.queued, app.in_progress, app.blocked), (1, 1, 1));
    let lib = &repos[1];
    assert_eq!((lib.done, lib.escalated), (1, 1));
}

#[test]
fn starting_counts_as_in_progress() {
    let queue = MemQueueStore::with_tasks([task("t/1", "acme/app", TaskStatus::Starting)]);
    let repos = count_tasks(&queue);
    assert_eq!(repos[0].in_progress, 1);
}

#[test]
fn live_json_shape() {
    let report = StatusReport::Live(StatusSnapshot {
        daemon_id: "d-1".to_string(),
        pid: 7,
        mode: "running".to_string(),
        uptime_ms: 60_000,
        repos: vec![RepoStatus {
            repo: "acme/app".to_string(),
            queued: 2,
            in_progress: 1,
            blocked: 0,
            done: 3,
            escalated: 0,
            active_sessions: 1,
        }],
        throttle: vec![ThrottleDecision {
            profile: "default".to_string(),
            state: ThrottleState::Soft,
            resume_at_ms: Some(1_000),
            windows: vec![WindowSnapshot {
                window: "5h".to_string(),
                used: 900,
                soft_cap: 800,
                hard_cap: 950,
                reset_at_ms: None,
            }],
            checked_at_ms: 0,
        }],
    });
    let value = to_json(&report);
    assert_eq!(value["running"], true);
    assert_eq!(value["mode"], "running");
    assert_eq!(value["repos"][0]["repo"], "acme/app");
    assert_eq!(value["repos"][0]["inProgress"], 1);
    assert_eq!(value["throttle"][0]["state"], "soft");
    assert_eq!(value["throttle"][0]["windows"][0]["softCap"], 800);
    assert!(value["error"].is_null());
}

#[test]
fn offline_json_reports_not_running() {
    let report = StatusReport::Offline(OfflineStatus {
        record: None,
        pid_alive: false,
        mode: "paused".to_string(),
        repos: vec![],
    });
    let value = to_json(&report);
    assert_eq!(value["running"], false);
    assert_eq!(value["mode"], "paused");
    assert!(value["daemonId"].is_null());
}

#[test]
fn text_render_offline_without_record() {
    let report = StatusReport::Offline(OfflineStatus {
        record: None,
        pid_alive: false,
        mode: "running".to_string(),
        repos: vec![],
    });
    let text = render_text(&report);
    assert!(text.contains("daemon: not running"));
    assert!(text.contains("mode: running"));
    assert!(text.contains("no tasks"));
}

#[test]
fn text_render_live_includes_throttle_and_table() {
    let report = StatusReport::Live(StatusSnapshot {
        daemon_id: "d-1".to_string(),
        pid: 7,
        mode: "draining".to_string(),
        uptime_ms: 5_000,
        repos: vec![RepoStatus {
            repo: "acme/app".to_string(),
            queued: 1,
            in_progress: 0,
            blocked: 0,
            done: 0,
            escalated: 0,
            active_sessions: 0,
        }],
        throttle: vec![ThrottleDecision {
            profile: "default".to_string(),
            state: ThrottleState::Ok,
            resume_at_ms: None,
            windows: vec![],
            checked_at_ms: 0,
        }],
    });
    let text = render_text(&report);
    assert!(text.contains("daemon: running (pid 7"));
    assert!(text.contains("mode draining"));
    assert!(text.contains("throttle[default]: ok"));
    assert!(text.contains("acme/app"));
}
