// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared, rate-limited hosting client.
//!
//! One instance is shared by every worker. Two semaphores bound the
//! process-wide request footprint: `max_inflight` for everything,
//! `max_inflight_writes` for mutating calls on top. With both at 1 the
//! client fully serializes.

use crate::client::HostingClient;
use crate::error::HostingError;
use crate::types::{CheckRun, Comment, Issue, MergeResult, PullRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Semaphore-bounded wrapper around any [`HostingClient`].
pub struct SharedClient<H> {
    inner: H,
    inflight: Arc<Semaphore>,
    inflight_writes: Arc<Semaphore>,
}

impl<H: HostingClient> SharedClient<H> {
    pub fn new(inner: H, max_inflight: usize, max_inflight_writes: usize) -> Self {
        Self {
            inner,
            inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
            inflight_writes: Arc::new(Semaphore::new(max_inflight_writes.max(1))),
        }
    }

    async fn read_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, HostingError> {
        self.inflight
            .acquire()
            .await
            .map_err(|_| HostingError::Transient("hosting client closed".to_string()))
    }

    async fn write_permits(
        &self,
    ) -> Result<
        (tokio::sync::SemaphorePermit<'_>, tokio::sync::SemaphorePermit<'_>),
        HostingError,
    > {
        // Write permit first so writers queue among themselves without
        // starving the shared read pool.
        let write = self
            .inflight_writes
            .acquire()
            .await
            .map_err(|_| HostingError::Transient("hosting client closed".to_string()))?;
        let read = self.read_permit().await?;
        Ok((write, read))
    }
}

#[async_trait]
impl<H: HostingClient> HostingClient for SharedClient<H> {
    async fn get_issue(&self, repo: &str, number: u64) -> Result<Issue, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.get_issue(repo, number).await
    }

    async fn list_issue_comments(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.list_issue_comments(repo, number).await
    }

    async fn post_issue_comment(
        &self,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.post_issue_comment(repo, number, body).await
    }

    async fn add_labels(
        &self,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.add_labels(repo, number, labels).await
    }

    async fn remove_label(
        &self,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.remove_label(repo, number, label).await
    }

    async fn create_label(&self, repo: &str, label: &str) -> Result<(), HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.create_label(repo, label).await
    }

    async fn get_pr(&self, repo: &str, number: u64) -> Result<PullRequest, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.get_pr(repo, number).await
    }

    async fn list_prs_for_issue(
        &self,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<PullRequest>, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.list_prs_for_issue(repo, issue_number).await
    }

    async fn create_pr(
        &self,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.create_pr(repo, head, base, title, body).await
    }

    async fn merge_pr(&self, repo: &str, number: u64) -> Result<MergeResult, HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.merge_pr(repo, number).await
    }

    async fn update_pr_branch(&self, repo: &str, number: u64) -> Result<(), HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.update_pr_branch(repo, number).await
    }

    async fn delete_ref(&self, repo: &str, ref_name: &str) -> Result<(), HostingError> {
        let _permits = self.write_permits().await?;
        self.inner.delete_ref(repo, ref_name).await
    }

    async fn required_checks(
        &self,
        repo: &str,
        base_branch: &str,
    ) -> Result<Vec<String>, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.required_checks(repo, base_branch).await
    }

    async fn check_runs(
        &self,
        repo: &str,
        head_sha: &str,
    ) -> Result<Vec<CheckRun>, HostingError> {
        let _permit = self.read_permit().await?;
        self.inner.check_runs(repo, head_sha).await
    }
}

#[cfg(test)]
#[path = "shared_tests.rs"]
mod tests;
