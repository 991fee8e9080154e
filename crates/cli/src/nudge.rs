// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `nudge` command: queue an operator message for an in-flight task.
//!
//! The message lands in the session's `nudges.jsonl`; the supervisor
//! drains it at the next safe checkpoint between tool boundaries.

use ralph_agent::append_nudge;
use ralph_core::{ControlPaths, IssueRef, SessionPaths, TaskRecord};
use ralph_storage::{FsQueueStore, QueueStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NudgeCmdError {
    #[error("no task matches {0:?}")]
    NoSuchTask(String),

    #[error("task {path} has no active session (status {status})")]
    NoActiveSession { path: String, status: String },

    #[error("task {path} records unsafe session id {session_id:?}")]
    UnsafeSessionId { path: String, session_id: String },

    #[error("queue error: {0}")]
    Queue(#[from] ralph_storage::QueueError),

    #[error("nudge log error: {0}")]
    Log(#[from] ralph_agent::NudgeError),
}

pub fn handle(paths: &ControlPaths, task_ref: &str, message: &str) -> anyhow::Result<()> {
    let queue = FsQueueStore::new(&paths.queue_dir);
    let nudge_id = uuid::Uuid::new_v4().to_string();
    let task = send_nudge(&queue, &paths.sessions_dir, task_ref, message, &nudge_id, now_ms())?;
    println!("nudged {} (session {})", task.path, task.session_id);
    Ok(())
}

/// Locate the task, validate its session, and append the nudge record.
pub fn send_nudge(
    queue: &dyn QueueStore,
    sessions_dir: &std::path::Path,
    task_ref: &str,
    message: &str,
    nudge_id: &str,
    ts: u64,
) -> Result<TaskRecord, NudgeCmdError> {
    let task = find_task(queue, task_ref)?;
    if !task.status.allows_session() || task.session_id.is_empty() {
        return Err(NudgeCmdError::NoActiveSession {
            path: task.path.clone(),
            status: task.status.to_string(),
        });
    }
    let session = SessionPaths::resolve(sessions_dir, &task.session_id).ok_or_else(|| {
        NudgeCmdError::UnsafeSessionId {
            path: task.path.clone(),
            session_id: task.session_id.clone(),
        }
    })?;
    append_nudge(&session.nudges_log, nudge_id, message, ts)?;
    Ok(task)
}

/// Match a task by its stable path id or by issue reference.
fn find_task(queue: &dyn QueueStore, task_ref: &str) -> Result<TaskRecord, NudgeCmdError> {
    let tasks = queue.list()?;
    if let Some(task) = tasks.iter().find(|t| t.path == task_ref) {
        return Ok(task.clone());
    }
    if let Ok(issue) = task_ref.parse::<IssueRef>() {
        let canonical = issue.to_string();
        if let Some(task) = tasks.iter().find(|t| t.issue == canonical) {
            return Ok(task.clone());
        }
    }
    Err(NudgeCmdError::NoSuchTask(task_ref.to_string()))
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "nudge_tests.rs"]
mod tests;
