// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `status` command: daemon liveness, mode, throttle, per-repo counts.
//!
//! Prefers a live socket query; when nothing is listening it degrades to
//! on-disk inspection (registry record, control file, queue directory) so
//! operators still get a picture of parked state.

use crate::client::{ClientError, DaemonClient};
use ralph_core::{format_elapsed_ms, ControlPaths, TaskStatus};
use ralph_daemon::protocol::{RepoStatus, StatusSnapshot};
use ralph_daemon::{ControlFile, DaemonRecord};
use ralph_storage::{FsQueueStore, QueueStore};
use ralph_throttle::{ThrottleDecision, ThrottleState};
use serde_json::json;
use std::collections::BTreeMap;

/// What `status` found, from the socket or from disk.
pub enum StatusReport {
    /// The daemon answered over IPC.
    Live(StatusSnapshot),
    /// Nothing listening; assembled from on-disk state.
    Offline(OfflineStatus),
}

pub struct OfflineStatus {
    /// Last registry record, if one was ever written.
    pub record: Option<DaemonRecord>,
    /// Whether the recorded PID still answers signal 0.
    pub pid_alive: bool,
    /// Mode from the control file (what the daemon would adopt on start).
    pub mode: String,
    pub repos: Vec<RepoStatus>,
}

pub async fn handle(paths: &ControlPaths, json: bool) -> anyhow::Result<()> {
    let report = collect(paths).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&report))?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(())
}

/// Query the daemon, falling back to disk when it is unreachable.
pub async fn collect(paths: &ControlPaths) -> Result<StatusReport, ClientError> {
    let client = DaemonClient::new(&paths.socket_path);
    match client.status().await {
        Ok(snapshot) => Ok(StatusReport::Live(snapshot)),
        Err(ClientError::DaemonNotRunning) => Ok(StatusReport::Offline(collect_offline(paths))),
        Err(e) => Err(e),
    }
}

fn collect_offline(paths: &ControlPaths) -> OfflineStatus {
    let record = DaemonRecord::read(&paths.daemon_registry).ok().flatten();
    let pid_alive = record
        .as_ref()
        .map(|r| pid_alive(r.pid))
        .unwrap_or(false);
    let mode = ControlFile::load(&paths.control_file())
        .unwrap_or_default()
        .mode
        .as_str()
        .to_string();
    let repos = count_tasks(&FsQueueStore::new(&paths.queue_dir));
    OfflineStatus { record, pid_alive, mode, repos }
}

fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else { return false };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

/// Aggregate queue-directory task records into per-repo counts.
pub fn count_tasks(queue: &dyn QueueStore) -> Vec<RepoStatus> {
    let mut by_repo: BTreeMap<String, RepoStatus> = BTreeMap::new();
    let Ok(tasks) = queue.list() else { return Vec::new() };
    for task in tasks {
        let entry = by_repo.entry(task.repo.clone()).or_insert_with(|| RepoStatus {
            repo: task.repo.clone(),
            queued: 0,
            in_progress: 0,
            blocked: 0,
            done: 0,
            escalated: 0,
            active_sessions: 0,
        });
        match task.status {
            TaskStatus::Queued => entry.queued += 1,
            TaskStatus::Starting | TaskStatus::InProgress => entry.in_progress += 1,
            TaskStatus::Blocked => entry.blocked += 1,
            TaskStatus::Done => entry.done += 1,
            TaskStatus::Escalated => entry.escalated += 1,
        }
    }
    by_repo.into_values().collect()
}

pub fn to_json(report: &StatusReport) -> serde_json::Value {
    match report {
        StatusReport::Live(s) => json!({
            "running": true,
            "daemonId": s.daemon_id,
            "pid": s.pid,
            "mode": s.mode,
            "uptimeMs": s.uptime_ms,
            "repos": repos_json(&s.repos),
            "throttle": throttle_json(&s.throttle),
            "error": null,
        }),
        StatusReport::Offline(o) => json!({
            "running": false,
            "daemonId": o.record.as_ref().map(|r| r.daemon_id.clone()),
            "pid": o.record.as_ref().map(|r| r.pid),
            "pidAlive": o.pid_alive,
            "mode": o.mode,
            "repos": repos_json(&o.repos),
            "throttle": [],
            "error": null,
        }),
    }
}

fn repos_json(repos: &[RepoStatus]) -> serde_json::Value {
    repos
        .iter()
        .map(|r| {
            json!({
                "repo": r.repo,
                "queued": r.queued,
                "inProgress": r.in_progress,
                "blocked": r.blocked,
                "done": r.done,
                "escalated": r.escalated,
                "activeSessions": r.active_sessions,
            })
        })
        .collect()
}

fn throttle_json(decisions: &[ThrottleDecision]) -> serde_json::Value {
    decisions
        .iter()
        .map(|d| {
            json!({
                "profile": d.profile,
                "state": d.state.to_string(),
                "resumeAtMs": d.resume_at_ms,
                "windows": d.windows.iter().map(|w| json!({
                    "window": w.window,
                    "used": w.used,
                    "softCap": w.soft_cap,
                    "hardCap": w.hard_cap,
                    "resetAtMs": w.reset_at_ms,
                })).collect::<Vec<_>>(),
            })
        })
        .collect()
}

pub fn render_text(report: &StatusReport) -> String {
    let mut out = String::new();
    match report {
        StatusReport::Live(s) => {
            out.push_str(&format!(
                "daemon: running (pid {}, up {}, mode {})\n",
                s.pid,
                format_elapsed_ms(s.uptime_ms),
                s.mode,
            ));
            for d in &s.throttle {
                out.push_str(&render_throttle_line(d));
            }
            render_repo_table(&mut out, &s.repos);
        }
        StatusReport::Offline(o) => {
            match &o.record {
                Some(record) if o.pid_alive => {
                    // Socket gone but the PID answers: mid-start or wedged.
                    out.push_str(&format!(
                        "daemon: unreachable (pid {} alive, socket not answering)\n",
                        record.pid,
                    ));
                }
                Some(record) => {
                    out.push_str(&format!(
                        "daemon: not running (last pid {}, started {})\n",
                        record.pid, record.started_at,
                    ));
                }
                None => out.push_str("daemon: not running\n"),
            }
            out.push_str(&format!("mode: {}\n", o.mode));
            render_repo_table(&mut out, &o.repos);
        }
    }
    out
}

fn render_throttle_line(d: &ThrottleDecision) -> String {
    let mut line = format!("throttle[{}]: {}", d.profile, d.state);
    if d.state != ThrottleState::Ok {
        if let Some(resume_at) = d.resume_at_ms {
            let now = now_ms();
            if resume_at > now {
                line.push_str(&format!(" (resumes in {})", format_elapsed_ms(resume_at - now)));
            }
        }
    }
    for w in &d.windows {
        line.push_str(&format!(" {}={}/{}", w.window, w.used, w.hard_cap));
    }
    line.push('\n');
    line
}

fn render_repo_table(out: &mut String, repos: &[RepoStatus]) {
    if repos.is_empty() {
        out.push_str("no tasks\n");
        return;
    }
    out.push_str(&format!(
        "{:<32} {:>6} {:>8} {:>8} {:>6} {:>9} {:>8}\n",
        "REPO", "QUEUED", "ACTIVE", "BLOCKED", "DONE", "ESCALATED", "SESSIONS",
    ));
    for r in repos {
        out.push_str(&format!(
            "{:<32} {:>6} {:>8} {:>8} {:>6} {:>9} {:>8}\n",
            r.repo, r.queued, r.in_progress, r.blocked, r.done, r.escalated, r.active_sessions,
        ));
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
