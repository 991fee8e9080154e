// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree operations behind a capability trait.
//!
//! The worker only needs a handful of operations; [`RealGit`] shells out
//! to `git`, tests use [`FakeGit`]. Two tasks of one repo never share a
//! worktree path — the path embeds the issue number.

use async_trait::async_trait;
use ralph_core::ErrorKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Worktree errors
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("git {command:?} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("worktree path equals the repository root: {0}")]
    RootCollision(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorktreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorktreeError::RootCollision(_) => ErrorKind::Safety,
            WorktreeError::Git { .. } | WorktreeError::Io(_) => ErrorKind::Transient,
        }
    }
}

/// Snapshot of a worktree's head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadState {
    pub branch: Option<String>,
    pub detached: bool,
}

/// Git operations the worker depends on.
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Create (or reuse) a worktree at `path` on `branch`, branching from
    /// `base` when new.
    async fn ensure_worktree(
        &self,
        repo_root: &Path,
        path: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), WorktreeError>;

    /// Head state of an existing worktree.
    async fn head_state(&self, path: &Path) -> Result<HeadState, WorktreeError>;

    /// Attach a detached worktree to a recovery branch at its current
    /// commit.
    async fn materialize_recovery_branch(
        &self,
        path: &Path,
        branch: &str,
    ) -> Result<(), WorktreeError>;

    /// Remove a worktree after terminal status.
    async fn remove_worktree(&self, repo_root: &Path, path: &Path) -> Result<(), WorktreeError>;
}

/// Production implementation shelling out to `git`.
#[derive(Clone, Default)]
pub struct RealGit;

impl RealGit {
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<String, WorktreeError> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await?;
        if !output.status.success() {
            return Err(WorktreeError::Git {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl GitOps for RealGit {
    async fn ensure_worktree(
        &self,
        repo_root: &Path,
        path: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), WorktreeError> {
        if ralph_core::task::worktree_equals_repo_root(path, repo_root) {
            return Err(WorktreeError::RootCollision(path.to_path_buf()));
        }
        if path.join(".git").exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = path.display().to_string();
        // Reuse the branch when it already exists, otherwise fork it off
        // the base.
        let branch_exists = self
            .run(repo_root, &["rev-parse", "--verify", &format!("refs/heads/{branch}")])
            .await
            .is_ok();
        if branch_exists {
            self.run(repo_root, &["worktree", "add", &path_str, branch]).await?;
        } else {
            self.run(repo_root, &["worktree", "add", "-b", branch, &path_str, base]).await?;
        }
        Ok(())
    }

    async fn head_state(&self, path: &Path) -> Result<HeadState, WorktreeError> {
        let branch = self.run(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch == "HEAD" {
            Ok(HeadState { branch: None, detached: true })
        } else {
            Ok(HeadState { branch: Some(branch), detached: false })
        }
    }

    async fn materialize_recovery_branch(
        &self,
        path: &Path,
        branch: &str,
    ) -> Result<(), WorktreeError> {
        self.run(path, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn remove_worktree(
        &self,
        repo_root: &Path,
        path: &Path,
    ) -> Result<(), WorktreeError> {
        let path_str = path.display().to_string();
        self.run(repo_root, &["worktree", "remove", "--force", &path_str]).await?;
        Ok(())
    }
}

/// Scriptable in-memory git for tests.
#[derive(Default)]
pub struct FakeGit {
    state: parking_lot::Mutex<FakeGitState>,
}

#[derive(Default)]
struct FakeGitState {
    worktrees: HashMap<PathBuf, HeadState>,
    recovery_branches: Vec<(PathBuf, String)>,
    removed: Vec<PathBuf>,
    fail_ensure: bool,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detached_worktree(self, path: &Path) -> Self {
        self.state
            .lock()
            .worktrees
            .insert(path.to_path_buf(), HeadState { branch: None, detached: true });
        self
    }

    pub fn fail_ensure(&self) {
        self.state.lock().fail_ensure = true;
    }

    pub fn recovery_branches(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().recovery_branches.clone()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.state.lock().removed.clone()
    }

    pub fn worktree_branch(&self, path: &Path) -> Option<String> {
        self.state.lock().worktrees.get(path).and_then(|h| h.branch.clone())
    }
}

#[async_trait]
impl GitOps for FakeGit {
    async fn ensure_worktree(
        &self,
        repo_root: &Path,
        path: &Path,
        branch: &str,
        _base: &str,
    ) -> Result<(), WorktreeError> {
        if ralph_core::task::worktree_equals_repo_root(path, repo_root) {
            return Err(WorktreeError::RootCollision(path.to_path_buf()));
        }
        let mut state = self.state.lock();
        if state.fail_ensure {
            return Err(WorktreeError::Git {
                command: "git worktree add".to_string(),
                stderr: "scripted failure".to_string(),
            });
        }
        state.worktrees.entry(path.to_path_buf()).or_insert(HeadState {
            branch: Some(branch.to_string()),
            detached: false,
        });
        Ok(())
    }

    async fn head_state(&self, path: &Path) -> Result<HeadState, WorktreeError> {
        self.state.lock().worktrees.get(path).cloned().ok_or_else(|| WorktreeError::Git {
            command: "git rev-parse".to_string(),
            stderr: format!("not a worktree: {}", path.display()),
        })
    }

    async fn materialize_recovery_branch(
        &self,
        path: &Path,
        branch: &str,
    ) -> Result<(), WorktreeError> {
        let mut state = self.state.lock();
        state.recovery_branches.push((path.to_path_buf(), branch.to_string()));
        state
            .worktrees
            .insert(path.to_path_buf(), HeadState { branch: Some(branch.to_string()), detached: false });
        Ok(())
    }

    async fn remove_worktree(
        &self,
        _repo_root: &Path,
        path: &Path,
    ) -> Result<(), WorktreeError> {
        let mut state = self.state.lock();
        state.worktrees.remove(path);
        state.removed.push(path.to_path_buf());
        Ok(())
    }
}
