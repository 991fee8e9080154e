// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue parity audit.
//!
//! The local queue and the upstream labels drift when writebacks fail or
//! humans edit labels by hand. The audit only counts and reports; fixing
//! drift is a human (or future) concern.

use crate::error::EngineError;
use ralph_core::TaskStatus;
use ralph_hosting::HostingClient;
use ralph_storage::QueueStore;
use serde::{Deserialize, Serialize};

/// Label the worker maintains on blocked tasks' issues.
pub const BLOCKED_LABEL: &str = "ralph/blocked";
/// Label the worker maintains on in-progress tasks' issues.
pub const IN_PROGRESS_LABEL: &str = "ralph/in-progress";

/// Drift counts from one audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub repo: String,
    pub checked: u32,
    /// Local state says a label should exist upstream and it does not.
    pub missing_upstream: u32,
    /// Upstream carries a state label the local queue does not justify.
    pub stale_upstream: u32,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        self.missing_upstream > 0 || self.stale_upstream > 0
    }
}

/// Compare the local blocked/in-progress view against upstream labels.
pub async fn audit_queue_parity(
    host: &dyn HostingClient,
    queue: &dyn QueueStore,
    repo: &str,
) -> Result<DriftReport, EngineError> {
    let mut report = DriftReport {
        repo: repo.to_string(),
        checked: 0,
        missing_upstream: 0,
        stale_upstream: 0,
    };
    for task in queue.list()? {
        if task.repo != repo {
            continue;
        }
        let Ok(issue_ref) = task.issue.parse::<ralph_core::IssueRef>() else {
            tracing::warn!(task = %task.path, issue = %task.issue, "unparseable issue ref; skipping");
            continue;
        };
        let expected_label = match task.status {
            TaskStatus::Blocked => Some(BLOCKED_LABEL),
            TaskStatus::InProgress | TaskStatus::Starting => Some(IN_PROGRESS_LABEL),
            _ => None,
        };
        let issue = host.get_issue(repo, issue_ref.number).await?;
        report.checked += 1;

        for label in [BLOCKED_LABEL, IN_PROGRESS_LABEL] {
            let upstream_has = issue.labels.iter().any(|l| l == label);
            let should_have = expected_label == Some(label);
            match (should_have, upstream_has) {
                (true, false) => report.missing_upstream += 1,
                (false, true) => report.stale_upstream += 1,
                _ => {}
            }
        }
    }
    if report.has_drift() {
        tracing::warn!(
            repo,
            missing = report.missing_upstream,
            stale = report.stale_upstream,
            "queue parity drift detected"
        );
    }
    Ok(report)
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
