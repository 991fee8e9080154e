// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hosting client capability.

use crate::error::HostingError;
use crate::types::{CheckRun, Comment, Issue, MergeResult, PullRequest};
use async_trait::async_trait;

/// Everything the orchestrator asks of the hosting service.
///
/// `repo` is always the `<owner>/<name>` slug. Implementations classify
/// failures into [`HostingError`]; the worker's retry policy depends on it.
#[async_trait]
pub trait HostingClient: Send + Sync + 'static {
    // -- issues ----------------------------------------------------------

    async fn get_issue(&self, repo: &str, number: u64) -> Result<Issue, HostingError>;

    async fn list_issue_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, HostingError>;

    async fn post_issue_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostingError>;

    // -- labels ----------------------------------------------------------

    async fn add_labels(
        &self,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError>;

    async fn remove_label(&self, repo: &str, number: u64, label: &str)
        -> Result<(), HostingError>;

    /// Create a repo-level label so a subsequent `add_labels` succeeds.
    async fn create_label(&self, repo: &str, label: &str) -> Result<(), HostingError>;

    // -- pull requests ---------------------------------------------------

    async fn get_pr(&self, repo: &str, number: u64) -> Result<PullRequest, HostingError>;

    /// PRs linked to an issue (closing references), newest first.
    async fn list_prs_for_issue(
        &self,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<PullRequest>, HostingError>;

    async fn create_pr(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostingError>;

    async fn merge_pr(&self, repo: &str, number: u64) -> Result<MergeResult, HostingError>;

    /// Update the PR branch from its base ("update branch" button).
    async fn update_pr_branch(&self, repo: &str, number: u64) -> Result<(), HostingError>;

    /// Delete a head ref after merge.
    async fn delete_ref(&self, repo: &str, ref_name: &str) -> Result<(), HostingError>;

    // -- checks ----------------------------------------------------------

    /// Names of the checks required on PRs targeting `base_branch`.
    async fn required_checks(
        &self,
        repo: &str,
        base_branch: &str,
    ) -> Result<Vec<String>, HostingError>;

    /// Current check runs for a head SHA.
    async fn check_runs(&self, repo: &str, head_sha: &str)
        -> Result<Vec<CheckRun>, HostingError>;
}
