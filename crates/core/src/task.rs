// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record model and status state machine.
//!
//! A task is one unit of queued work: "drive issue N of repo R to a merged
//! PR". Records are produced by external tooling, so every field this crate
//! does not understand is preserved verbatim in `extra` and written back
//! unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Queued,
    Starting,
    InProgress,
    Done,
    Blocked,
    Escalated,
}

impl TaskStatus {
    /// Whether this status is terminal (the task is never picked up again).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Escalated)
    }

    /// Whether a session id may be recorded in this status.
    pub fn allows_session(&self) -> bool {
        matches!(self, TaskStatus::Starting | TaskStatus::InProgress)
    }

    /// Allowed status transition graph.
    ///
    /// `queued → starting → in-progress → done | blocked | escalated`;
    /// starting may fall back to queued (spawn failure) and blocked tasks
    /// requeue when unblocked. Terminal statuses never transition.
    pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (from, to),
            (Queued, Starting)
                | (Starting, InProgress)
                | (Starting, Queued)
                | (Starting, Blocked)
                | (Starting, Escalated)
                | (InProgress, Done)
                | (InProgress, Blocked)
                | (InProgress, Escalated)
                | (InProgress, Queued)
                | (Blocked, Queued)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Starting => "starting",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Escalated => "escalated",
        };
        write!(f, "{}", s)
    }
}

/// Repository priority band. Band `p` earns `p + 1` scheduler turns per
/// policy cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityBand(pub u8);

impl PriorityBand {
    pub const MAX: u8 = 3;

    /// Clamp an arbitrary value into the valid band range `0..=3`.
    pub fn clamped(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    /// Scheduler turns this band earns per policy cycle.
    pub fn turns(&self) -> u32 {
        u32::from(self.0) + 1
    }
}

impl Default for PriorityBand {
    fn default() -> Self {
        Self(0)
    }
}

/// How a task reached `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// Resolved by a merged pull request.
    Pr,
    /// Verified closed upstream without a PR.
    Verified,
}

/// One entry in the auto-resolve ledger kept on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResolveEntry {
    pub at_ms: u64,
    pub signature: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A task record as stored in the queue directory.
///
/// Field names mirror the external task-file format; unknown fields
/// round-trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable task id (the record's path in the producing system).
    #[serde(rename = "_path")]
    pub path: String,
    #[serde(rename = "_name")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    pub repo: String,
    /// Issue reference `<owner>/<name>#<n>`.
    pub issue: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: PriorityBand,
    #[serde(default)]
    pub scope: String,
    #[serde(rename = "session-id", default)]
    pub session_id: String,
    #[serde(rename = "worktree-path", default)]
    pub worktree_path: String,
    #[serde(rename = "blocked-source", default, skip_serializing_if = "Option::is_none")]
    pub blocked_source: Option<String>,
    #[serde(rename = "blocked-reason", default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(rename = "blocked-details", default, skip_serializing_if = "Option::is_none")]
    pub blocked_details: Option<String>,
    #[serde(rename = "blocked-at", default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<u64>,
    #[serde(rename = "blocked-checked-at", default, skip_serializing_if = "Option::is_none")]
    pub blocked_checked_at: Option<u64>,
    #[serde(rename = "completed-at", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(rename = "auto-resolve-ledger", default, skip_serializing_if = "Vec::is_empty")]
    pub auto_resolve_ledger: Vec<AutoResolveEntry>,
    #[serde(rename = "auto-resolve-last-at", default, skip_serializing_if = "Option::is_none")]
    pub auto_resolve_last_at: Option<u64>,
    /// Unknown fields, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TaskRecord {
    /// Minimal record for a freshly queued task.
    pub fn new(path: impl Into<String>, repo: impl Into<String>, issue: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
        Self {
            path,
            name,
            task_type: "issue".to_string(),
            repo: repo.into(),
            issue: issue.into(),
            status: TaskStatus::Queued,
            priority: PriorityBand::default(),
            scope: String::new(),
            session_id: String::new(),
            worktree_path: String::new(),
            blocked_source: None,
            blocked_reason: None,
            blocked_details: None,
            blocked_at: None,
            blocked_checked_at: None,
            completed_at: None,
            auto_resolve_ledger: Vec::new(),
            auto_resolve_last_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Check record-level invariants.
    ///
    /// A session id may only be present while starting or in-progress.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.session_id.is_empty() && !self.status.allows_session() {
            return Err(format!(
                "session-id set while status is {} (task {})",
                self.status, self.path
            ));
        }
        Ok(())
    }

    /// Clear the in-flight fields when a task reaches a terminal or parked
    /// status.
    pub fn clear_session_fields(&mut self) {
        self.session_id.clear();
        self.worktree_path.clear();
    }
}

/// Whether a recorded worktree path collides with the repository root.
///
/// Canonicalizes both sides when possible so `/repo/.` and `/repo` compare
/// equal; falls back to a literal comparison for paths that do not exist.
pub fn worktree_equals_repo_root(worktree: &Path, repo_root: &Path) -> bool {
    let canon_worktree = std::fs::canonicalize(worktree).unwrap_or_else(|_| worktree.to_path_buf());
    let canon_root = std::fs::canonicalize(repo_root).unwrap_or_else(|_| repo_root.to_path_buf());
    canon_worktree == canon_root
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
