// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PR recovery.
//!
//! Before spending an agent session on a task, check whether the work is
//! already done upstream: a merged PR based on the bot branch resolves the
//! task outright, and an issue closed without a PR terminates it as
//! verified. Detached worktrees get one shot at a recovery branch before
//! the task is rejected.

use crate::error::EngineError;
use crate::worktree::GitOps;
use ralph_core::CompletionKind;
use ralph_hosting::{HostingClient, IssueState};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Terminal-run facts recorded when recovery short-circuits a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRun {
    pub outcome: String,
    pub completion_kind: CompletionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_pr_terminal_reason: Option<String>,
}

/// What recovery concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    /// A PR the task should adopt (none when terminal or nothing found).
    pub pr_url: Option<String>,
    /// Set when the task is already resolved and should jump to done.
    pub terminal_run: Option<TerminalRun>,
}

/// Check upstream state and the worktree before starting real work.
pub async fn try_ensure_pr_from_worktree(
    host: &dyn HostingClient,
    git: &dyn GitOps,
    repo: &str,
    issue_number: u64,
    bot_branch: &str,
    worktree: Option<&Path>,
) -> Result<RecoveryOutcome, EngineError> {
    // 1. A merged PR based on the bot branch already resolved the issue.
    let prs = host.list_prs_for_issue(repo, issue_number).await?;
    if let Some(merged) = prs.iter().find(|pr| pr.is_merged() && pr.base_ref == bot_branch) {
        tracing::info!(repo, issue = issue_number, pr = %merged.url, "issue already resolved by merged PR");
        return Ok(RecoveryOutcome {
            pr_url: None,
            terminal_run: Some(TerminalRun {
                outcome: "success".to_string(),
                completion_kind: CompletionKind::Pr,
                pr: Some(merged.url.clone()),
                no_pr_terminal_reason: None,
            }),
        });
    }

    // 2. The issue was closed upstream without a PR.
    let issue = host.get_issue(repo, issue_number).await?;
    if issue.state == IssueState::Closed {
        return Ok(RecoveryOutcome {
            pr_url: None,
            terminal_run: Some(TerminalRun {
                outcome: "success".to_string(),
                completion_kind: CompletionKind::Verified,
                pr: None,
                no_pr_terminal_reason: Some("ISSUE_CLOSED_UPSTREAM".to_string()),
            }),
        });
    }

    // 3. An open PR for the issue is adopted as-is.
    if let Some(open_pr) = prs.iter().find(|pr| pr.state == ralph_hosting::PrState::Open) {
        return Ok(RecoveryOutcome {
            pr_url: Some(open_pr.url.clone()),
            terminal_run: None,
        });
    }

    // 4. A detached worktree gets a recovery branch before anything is
    // rejected.
    if let Some(path) = worktree {
        if let Ok(head) = git.head_state(path).await {
            if head.detached {
                let branch = format!("bot/recovery-issue-{issue_number}");
                git.materialize_recovery_branch(path, &branch).await?;
                tracing::info!(repo, issue = issue_number, branch = %branch, "materialized recovery branch");
            }
        }
    }

    Ok(RecoveryOutcome { pr_url: None, terminal_run: None })
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
