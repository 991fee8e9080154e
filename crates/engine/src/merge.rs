// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-gate merge.
//!
//! Required checks are re-resolved before every merge attempt; the
//! "base branch was modified" race retries through update-branch a bounded
//! number of times. Head-branch deletion is deliberately conservative.

use crate::ci::required_check_state;
use crate::error::EngineError;
use ralph_config::RepoConfig;
use ralph_hosting::{CheckRun, HostingClient};

/// Result of a merge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged { pr_url: String, deleted_head: bool },
    /// Required checks have not reached a terminal state.
    ChecksPending { pending: Vec<String> },
    /// Required checks failed on re-resolution.
    ChecksFailed { failed: Vec<CheckRun> },
    /// Base kept moving; the task blocks with source `auto-update`.
    BlockedAutoUpdate { attempts: u32 },
}

/// Merge a task's PR.
pub async fn merge_task_pr(
    host: &dyn HostingClient,
    repo: &str,
    pr_number: u64,
    repo_config: &RepoConfig,
    max_update_retries: u32,
) -> Result<MergeOutcome, EngineError> {
    let mut attempts = 0u32;
    loop {
        let pr = host.get_pr(repo, pr_number).await?;

        // Checks are re-resolved before every attempt, not just the first.
        let (pending, failed) =
            required_check_state(host, repo, &pr.base_ref, &pr.head_sha).await?;
        if !failed.is_empty() {
            return Ok(MergeOutcome::ChecksFailed { failed });
        }
        if !pending.is_empty() {
            return Ok(MergeOutcome::ChecksPending { pending });
        }

        let head_sha_at_merge = pr.head_sha.clone();
        match host.merge_pr(repo, pr_number).await {
            Ok(_) => {
                let deleted_head = maybe_delete_head(
                    host,
                    repo,
                    pr_number,
                    repo_config,
                    &head_sha_at_merge,
                )
                .await?;
                return Ok(MergeOutcome::Merged { pr_url: pr.url, deleted_head });
            }
            Err(e) if e.is_base_modified() => {
                attempts += 1;
                if attempts > max_update_retries {
                    tracing::warn!(repo, pr = pr_number, attempts, "base kept moving; giving up");
                    return Ok(MergeOutcome::BlockedAutoUpdate { attempts });
                }
                tracing::info!(repo, pr = pr_number, attempts, "base modified; updating branch");
                host.update_pr_branch(repo, pr_number).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Delete the head branch only when every condition holds: merged, same
/// repo, base is the bot branch, head is not the default branch, and the
/// head ref has not moved since the merge.
async fn maybe_delete_head(
    host: &dyn HostingClient,
    repo: &str,
    pr_number: u64,
    repo_config: &RepoConfig,
    head_sha_at_merge: &str,
) -> Result<bool, EngineError> {
    let merged = host.get_pr(repo, pr_number).await?;
    let eligible = merged.is_merged()
        && !merged.cross_repo
        && merged.base_ref == repo_config.bot_branch
        && merged.head_ref != repo_config.default_branch
        && merged.head_sha == head_sha_at_merge;
    if !eligible {
        return Ok(false);
    }
    host.delete_ref(repo, &merged.head_ref).await?;
    Ok(true)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
