// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory hosting service for tests.

use crate::client::HostingClient;
use crate::error::HostingError;
use crate::types::{CheckRun, Comment, Issue, IssueState, MergeResult, PrState, PullRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub op: String,
    pub detail: String,
}

#[derive(Default)]
struct FakeState {
    issues: HashMap<(String, u64), Issue>,
    comments: HashMap<(String, u64), Vec<Comment>>,
    prs: HashMap<(String, u64), PullRequest>,
    issue_prs: HashMap<(String, u64), Vec<u64>>,
    repo_labels: HashSet<(String, String)>,
    required: HashMap<(String, String), Vec<String>>,
    checks: HashMap<(String, String), Vec<CheckRun>>,
    scripted: HashMap<String, VecDeque<Option<HostingError>>>,
    calls: Vec<HostCall>,
    next_comment_id: u64,
}

/// In-memory [`HostingClient`] with scriptable failures and a call log.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    // -- seeding ---------------------------------------------------------

    pub fn with_issue(self, repo: &str, issue: Issue) -> Self {
        self.state.lock().issues.insert((repo.to_string(), issue.number), issue);
        self
    }

    pub fn with_pr(self, repo: &str, pr: PullRequest) -> Self {
        self.state.lock().prs.insert((repo.to_string(), pr.number), pr);
        self
    }

    pub fn link_pr_to_issue(self, repo: &str, issue_number: u64, pr_number: u64) -> Self {
        self.state
            .lock()
            .issue_prs
            .entry((repo.to_string(), issue_number))
            .or_default()
            .push(pr_number);
        self
    }

    pub fn with_repo_label(self, repo: &str, label: &str) -> Self {
        self.state.lock().repo_labels.insert((repo.to_string(), label.to_string()));
        self
    }

    pub fn with_required_checks(self, repo: &str, base: &str, checks: &[&str]) -> Self {
        self.state.lock().required.insert(
            (repo.to_string(), base.to_string()),
            checks.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_check_runs(self, repo: &str, head_sha: &str, runs: Vec<CheckRun>) -> Self {
        self.state.lock().checks.insert((repo.to_string(), head_sha.to_string()), runs);
        self
    }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: &str, err: HostingError) {
        self.state.lock().scripted.entry(op.to_string()).or_default().push_back(Some(err));
    }

    /// Let the next call of `op` through unscripted (for sequencing
    /// "first call succeeds, second fails").
    pub fn pass_next(&self, op: &str) {
        self.state.lock().scripted.entry(op.to_string()).or_default().push_back(None);
    }

    // -- inspection ------------------------------------------------------

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<HostCall> {
        self.state.lock().calls.iter().filter(|c| c.op == op).cloned().collect()
    }

    pub fn comments(&self, repo: &str, number: u64) -> Vec<Comment> {
        self.state
            .lock()
            .comments
            .get(&(repo.to_string(), number))
            .cloned()
            .unwrap_or_default()
    }

    pub fn issue_labels(&self, repo: &str, number: u64) -> Vec<String> {
        self.state
            .lock()
            .issues
            .get(&(repo.to_string(), number))
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }

    pub fn pr(&self, repo: &str, number: u64) -> Option<PullRequest> {
        self.state.lock().prs.get(&(repo.to_string(), number)).cloned()
    }

    fn begin(&self, op: &str, detail: String) -> Result<(), HostingError> {
        let mut state = self.state.lock();
        state.calls.push(HostCall { op: op.to_string(), detail });
        if let Some(queue) = state.scripted.get_mut(op) {
            if let Some(Some(err)) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Convenience constructors for seeded entities.
impl FakeHost {
    pub fn open_issue(number: u64, title: &str) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            state: IssueState::Open,
            labels: Vec::new(),
        }
    }

    pub fn merged_pr(repo: &str, number: u64, base: &str) -> PullRequest {
        PullRequest {
            number,
            url: format!("https://example.com/{repo}/pull/{number}"),
            state: PrState::Merged,
            head_ref: format!("bot/issue-{number}"),
            head_sha: format!("sha-{number}"),
            base_ref: base.to_string(),
            cross_repo: false,
        }
    }

    pub fn open_pr(repo: &str, number: u64, head: &str, base: &str) -> PullRequest {
        PullRequest {
            number,
            url: format!("https://example.com/{repo}/pull/{number}"),
            state: PrState::Open,
            head_ref: head.to_string(),
            head_sha: format!("sha-{number}"),
            base_ref: base.to_string(),
            cross_repo: false,
        }
    }
}

#[async_trait]
impl HostingClient for FakeHost {
    async fn get_issue(&self, repo: &str, number: u64) -> Result<Issue, HostingError> {
        self.begin("get_issue", format!("{repo}#{number}"))?;
        self.state
            .lock()
            .issues
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("issue {repo}#{number}")))
    }

    async fn list_issue_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, HostingError> {
        self.begin("list_issue_comments", format!("{repo}#{number}"))?;
        Ok(self.comments(repo, number))
    }

    async fn post_issue_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostingError> {
        self.begin("post_issue_comment", format!("{repo}#{number}"))?;
        let mut state = self.state.lock();
        state.next_comment_id += 1;
        let comment = Comment { id: format!("c-{}", state.next_comment_id), body: body.to_string() };
        state.comments.entry((repo.to_string(), number)).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn add_labels(
        &self,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError> {
        self.begin("add_labels", format!("{repo}#{number}: {labels:?}"))?;
        let mut state = self.state.lock();
        for label in labels {
            if !state.repo_labels.contains(&(repo.to_string(), label.clone())) {
                return Err(HostingError::Validation(format!("label does not exist: {label}")));
            }
        }
        let issue = state
            .issues
            .get_mut(&(repo.to_string(), number))
            .ok_or_else(|| HostingError::NotFound(format!("issue {repo}#{number}")))?;
        for label in labels {
            if !issue.labels.contains(label) {
                issue.labels.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), HostingError> {
        self.begin("remove_label", format!("{repo}#{number}: {label}"))?;
        let mut state = self.state.lock();
        if let Some(issue) = state.issues.get_mut(&(repo.to_string(), number)) {
            issue.labels.retain(|l| l != label);
        }
        Ok(())
    }

    async fn create_label(&self, repo: &str, label: &str) -> Result<(), HostingError> {
        self.begin("create_label", format!("{repo}: {label}"))?;
        self.state.lock().repo_labels.insert((repo.to_string(), label.to_string()));
        Ok(())
    }

    async fn get_pr(&self, repo: &str, number: u64) -> Result<PullRequest, HostingError> {
        self.begin("get_pr", format!("{repo}#{number}"))?;
        self.state
            .lock()
            .prs
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("pr {repo}#{number}")))
    }

    async fn list_prs_for_issue(
        &self,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<PullRequest>, HostingError> {
        self.begin("list_prs_for_issue", format!("{repo}#{issue_number}"))?;
        let state = self.state.lock();
        let numbers = state
            .issue_prs
            .get(&(repo.to_string(), issue_number))
            .cloned()
            .unwrap_or_default();
        let mut prs: Vec<PullRequest> = numbers
            .iter()
            .filter_map(|n| state.prs.get(&(repo.to_string(), *n)).cloned())
            .collect();
        prs.reverse(); // newest first
        Ok(prs)
    }

    async fn create_pr(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        _body: &str,
    ) -> Result<PullRequest, HostingError> {
        self.begin("create_pr", format!("{repo}: {head} → {base} ({title})"))?;
        let mut state = self.state.lock();
        let number = 1000 + state.prs.len() as u64;
        let pr = PullRequest {
            number,
            url: format!("https://example.com/{repo}/pull/{number}"),
            state: PrState::Open,
            head_ref: head.to_string(),
            head_sha: format!("sha-{number}"),
            base_ref: base.to_string(),
            cross_repo: false,
        };
        state.prs.insert((repo.to_string(), number), pr.clone());
        Ok(pr)
    }

    async fn merge_pr(&self, repo: &str, number: u64) -> Result<MergeResult, HostingError> {
        self.begin("merge_pr", format!("{repo}#{number}"))?;
        let mut state = self.state.lock();
        let pr = state
            .prs
            .get_mut(&(repo.to_string(), number))
            .ok_or_else(|| HostingError::NotFound(format!("pr {repo}#{number}")))?;
        if pr.state != PrState::Open {
            return Err(HostingError::Validation(format!("pr {number} is not open")));
        }
        pr.state = PrState::Merged;
        Ok(MergeResult { merged: true, sha: Some(format!("merge-{number}")) })
    }

    async fn update_pr_branch(&self, repo: &str, number: u64) -> Result<(), HostingError> {
        self.begin("update_pr_branch", format!("{repo}#{number}"))?;
        let mut state = self.state.lock();
        if let Some(pr) = state.prs.get_mut(&(repo.to_string(), number)) {
            pr.head_sha = format!("{}+updated", pr.head_sha);
        }
        Ok(())
    }

    async fn delete_ref(&self, repo: &str, ref_name: &str) -> Result<(), HostingError> {
        self.begin("delete_ref", format!("{repo}: {ref_name}"))?;
        Ok(())
    }

    async fn required_checks(
        &self,
        repo: &str,
        base_branch: &str,
    ) -> Result<Vec<String>, HostingError> {
        self.begin("required_checks", format!("{repo}: {base_branch}"))?;
        Ok(self
            .state
            .lock()
            .required
            .get(&(repo.to_string(), base_branch.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn check_runs(
        &self,
        repo: &str,
        head_sha: &str,
    ) -> Result<Vec<CheckRun>, HostingError> {
        self.begin("check_runs", format!("{repo}: {head_sha}"))?;
        Ok(self
            .state
            .lock()
            .checks
            .get(&(repo.to_string(), head_sha.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
