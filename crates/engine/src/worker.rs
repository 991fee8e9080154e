// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-repository worker.
//!
//! One tick claims the next queued task and drives it through the gate
//! sequence: preflight → implementation session → plan/product/devex
//! review → ci → pr_evidence → merge. Every outcome lands in three
//! places: the run's gate rows, the task record, and (through labels and
//! comments) the hosting service. Blocking decisions claim an idempotency
//! key first so restarts never double-write.

use crate::alerts::write_alert;
use crate::audit::{BLOCKED_LABEL, IN_PROGRESS_LABEL};
use crate::ci::{classify_ci_failure, failure_signature, required_check_state};
use crate::error::EngineError;
use crate::markers::{parse_product_gap, parse_routing_decision, GapMarker, RoutingParse, RoutingVerdict};
use crate::merge::{merge_task_pr, MergeOutcome};
use crate::recovery::try_ensure_pr_from_worktree;
use crate::worktree::{GitOps, WorktreeError};
use async_trait::async_trait;
use ralph_agent::{SessionResult, TerminationReason};
use ralph_config::RepoConfig;
use ralph_core::{Clock, CompletionKind, IdGen, IssueRef, TaskRecord, TaskStatus};
use ralph_hosting::HostingClient;
use ralph_storage::{
    Gate, GateResultRecord, GateStatus, IdempotencyClaim, QueueStore, RunRecord, StateStore,
    TokenTotals,
};
use std::sync::Arc;
use std::time::Duration;

/// Advisory review output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub text: String,
}

/// The coding agent as the worker sees it.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run an advisory review session for a gate; returns the final text.
    async fn review(&self, task: &TaskRecord, gate: Gate) -> Result<ReviewOutcome, EngineError>;

    /// Run the implementation session for a task.
    async fn implement(
        &self,
        task: &TaskRecord,
        session_id: &str,
    ) -> Result<(SessionResult, Option<TokenTotals>), EngineError>;
}

/// Shared collaborators injected into every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Arc<StateStore>,
    pub queue: Arc<dyn QueueStore>,
    pub host: Arc<dyn HostingClient>,
    pub git: Arc<dyn GitOps>,
    pub runner: Arc<dyn AgentRunner>,
}

/// What one tick accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Completed { task_path: String, completion: CompletionKind },
    Blocked { task_path: String, source: String, reason: String },
    Escalated { task_path: String },
    Requeued { task_path: String },
}

/// Per-repository worker.
pub struct RepoWorker<C: Clock, I: IdGen> {
    repo: String,
    config: RepoConfig,
    deps: WorkerDeps,
    clock: C,
    id_gen: I,
    /// CI wait budget: poll count and interval.
    ci_poll_limit: u32,
    ci_poll_interval: Duration,
    ci_max_attempts: u32,
    merge_update_retries: u32,
    /// Returns true when the hard-throttle checkpoint should pause work.
    hard_throttled: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl<C: Clock, I: IdGen> RepoWorker<C, I> {
    pub fn new(
        repo: impl Into<String>,
        config: RepoConfig,
        deps: WorkerDeps,
        clock: C,
        id_gen: I,
    ) -> Self {
        Self {
            repo: repo.into(),
            config,
            deps,
            clock,
            id_gen,
            ci_poll_limit: 40,
            ci_poll_interval: Duration::from_secs(30),
            ci_max_attempts: 3,
            merge_update_retries: 3,
            hard_throttled: Arc::new(|| false),
        }
    }

    pub fn with_ci_polling(mut self, limit: u32, interval: Duration) -> Self {
        self.ci_poll_limit = limit;
        self.ci_poll_interval = interval;
        self
    }

    /// Install the hard-throttle checkpoint consulted at gate boundaries.
    pub fn with_throttle_checkpoint(
        mut self,
        check: Arc<dyn Fn() -> bool + Send + Sync>,
    ) -> Self {
        self.hard_throttled = check;
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Claim and run the next queued task for this repo.
    pub async fn tick(&self) -> Result<TickOutcome, EngineError> {
        let Some(task) = self.next_queued_task()? else {
            return Ok(TickOutcome::Idle);
        };
        let session_id = format!("ralph-{}-{}", task.name, self.id_gen.next());
        let session_id: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '-' })
            .collect();

        let task = self.deps.queue.transition(
            &task.path,
            TaskStatus::Queued,
            TaskStatus::Starting,
            &mut |t| t.session_id = session_id.clone(),
        )?;
        tracing::info!(repo = %self.repo, task = %task.path, session = %session_id, "task claimed");

        match self.run_task(task.clone()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(repo = %self.repo, task = %task.path, error = %e, "task run failed");
                match e.kind() {
                    ralph_core::ErrorKind::Transient => {
                        self.park(&task.path, TaskStatus::Queued, |_| {})?;
                        Ok(TickOutcome::Requeued { task_path: task.path })
                    }
                    ralph_core::ErrorKind::Auth => {
                        self.park(&task.path, TaskStatus::Escalated, |_| {})?;
                        Ok(TickOutcome::Escalated { task_path: task.path })
                    }
                    _ => {
                        let reason = e.kind().code().to_string();
                        self.park(&task.path, TaskStatus::Blocked, |t| {
                            t.blocked_source = Some("worker".to_string());
                            t.blocked_reason = Some(reason.clone());
                            t.blocked_details = Some(e.to_string());
                        })?;
                        Ok(TickOutcome::Blocked {
                            task_path: task.path,
                            source: "worker".to_string(),
                            reason: e.kind().code().to_string(),
                        })
                    }
                }
            }
        }
    }

    fn next_queued_task(&self) -> Result<Option<TaskRecord>, EngineError> {
        let mut candidates: Vec<TaskRecord> = self
            .deps
            .queue
            .list()?
            .into_iter()
            .filter(|t| t.repo == self.repo && t.status == TaskStatus::Queued)
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.path.cmp(&b.path)));
        Ok(candidates.into_iter().next())
    }

    async fn run_task(&self, mut task: TaskRecord) -> Result<TickOutcome, EngineError> {
        let issue: IssueRef = task
            .issue
            .parse()
            .map_err(|e| EngineError::Validation(format!("task {}: {e}", task.path)))?;
        let now_ms = self.clock.epoch_ms();
        let run_id = format!("run-{}", self.id_gen.next());
        self.deps.store.create_run(&RunRecord {
            id: run_id.clone(),
            repo: self.repo.clone(),
            issue_number: issue.number,
            task_ref: task.path.clone(),
            attempt_kind: task.task_type.clone(),
            started_at_ms: now_ms,
            completed_at_ms: None,
            outcome: None,
            tokens: None,
        })?;

        // Recovery first: the work may already be done upstream.
        let worktree = if task.worktree_path.is_empty() {
            None
        } else {
            Some(std::path::PathBuf::from(&task.worktree_path))
        };
        let recovery = try_ensure_pr_from_worktree(
            self.deps.host.as_ref(),
            self.deps.git.as_ref(),
            &self.repo,
            issue.number,
            &self.config.bot_branch,
            worktree.as_deref(),
        )
        .await?;
        if let Some(terminal) = recovery.terminal_run {
            for gate in Gate::CANONICAL {
                let mut record = GateResultRecord::pending(&run_id, gate);
                record.status = GateStatus::Skip;
                record.skip_reason = Some("resolved-upstream".to_string());
                record.pr_url = terminal.pr.clone();
                self.deps.store.upsert_run_gate_result(&record)?;
            }
            self.deps.store.finalize_run(
                &run_id,
                &terminal.outcome,
                self.clock.epoch_ms(),
                None,
            )?;
            let completed_at = self.clock.epoch_ms();
            self.park(&task.path, TaskStatus::Done, move |t| {
                t.completed_at = Some(completed_at);
            })?;
            return Ok(TickOutcome::Completed {
                task_path: task.path,
                completion: terminal.completion_kind,
            });
        }

        // -- preflight ---------------------------------------------------
        let worktree_path = self.config.worktrees_dir().join(format!("issue-{}", issue.number));
        let branch = format!("bot/issue-{}", issue.number);
        match self
            .deps
            .git
            .ensure_worktree(&self.config.root, &worktree_path, &branch, &self.config.bot_branch)
            .await
        {
            Ok(()) => {
                let mut record = GateResultRecord::pending(&run_id, Gate::Preflight);
                record.status = GateStatus::Pass;
                record.command = Some("git worktree add".to_string());
                self.deps.store.upsert_run_gate_result(&record)?;
            }
            Err(WorktreeError::RootCollision(path)) => {
                let mut record = GateResultRecord::pending(&run_id, Gate::Preflight);
                record.status = GateStatus::Fail;
                record.reason = Some("NO_WORKTREE_BRANCH".to_string());
                self.deps.store.upsert_run_gate_result(&record)?;
                self.deps.store.record_run_gate_artifact(
                    &run_id,
                    Gate::Preflight,
                    "note",
                    &format!("refuses to run in main checkout: {}", path.display()),
                )?;
                self.finalize(&run_id, "blocked", None)?;
                return self
                    .block_task(task, &issue, "preflight", "NO_WORKTREE_BRANCH", None)
                    .await;
            }
            Err(e) => return Err(e.into()),
        }
        let worktree_display = worktree_path.display().to_string();
        task = self.deps.queue.transition(
            &task.path,
            TaskStatus::Starting,
            TaskStatus::InProgress,
            &mut |t| t.worktree_path = worktree_display.clone(),
        )?;
        let _ = apply_labels(
            self.deps.host.as_ref(),
            &self.repo,
            issue.number,
            &[IN_PROGRESS_LABEL.to_string()],
        )
        .await;

        if let Some(outcome) = self.throttle_checkpoint(&task)? {
            self.finalize(&run_id, "paused", None)?;
            return Ok(outcome);
        }

        // -- implementation session -------------------------------------
        let (session, tokens) =
            self.deps.runner.implement(&task, &task.session_id).await?;
        if let Some(termination) = &session.termination {
            return self.escalate_termination(task, &issue, &run_id, termination, tokens).await;
        }
        if !session.success {
            self.finalize(&run_id, "blocked", tokens)?;
            return self
                .block_task(task, &issue, "agent", "SESSION_FAILED", session.exit_code.map(|c| format!("exit code {c}")))
                .await;
        }

        if let Some(outcome) = self.throttle_checkpoint(&task)? {
            self.finalize(&run_id, "paused", tokens)?;
            return Ok(outcome);
        }

        // -- review gates ------------------------------------------------
        for gate in [Gate::PlanReview, Gate::ProductReview, Gate::DevexReview] {
            let review = self.deps.runner.review(&task, gate).await?;
            if gate == Gate::ProductReview {
                if let GapMarker::Gap = parse_product_gap(&review.text) {
                    self.fail_gate(&run_id, gate, "PRODUCT_GAP", Some(&review.text))?;
                    self.finalize(&run_id, "blocked", tokens)?;
                    return self
                        .block_task(task, &issue, "product-review", "PRODUCT_GAP", None)
                        .await;
                }
            }
            match parse_routing_decision(&review.text) {
                RoutingParse::Found(decision) => match decision.verdict {
                    RoutingVerdict::Approve => {
                        let mut record = GateResultRecord::pending(&run_id, gate);
                        record.status = GateStatus::Pass;
                        self.deps.store.upsert_run_gate_result(&record)?;
                    }
                    RoutingVerdict::Revise => {
                        self.fail_gate(&run_id, gate, "REVISE", Some(&review.text))?;
                        self.finalize(&run_id, "blocked", tokens)?;
                        return self
                            .block_task(task, &issue, gate.as_str(), "REVISE", None)
                            .await;
                    }
                    RoutingVerdict::Reject => {
                        self.fail_gate(&run_id, gate, "REJECT", Some(&review.text))?;
                        self.finalize(&run_id, "escalated", tokens)?;
                        return self.escalate_task(task, &issue, "review-reject").await;
                    }
                },
                RoutingParse::NotFound => {
                    self.fail_gate(&run_id, gate, "NO_DECISION_MARKER", Some(&review.text))?;
                    self.finalize(&run_id, "blocked", tokens)?;
                    return self
                        .block_task(task, &issue, gate.as_str(), "NO_DECISION_MARKER", None)
                        .await;
                }
                RoutingParse::Malformed(detail) => {
                    self.fail_gate(&run_id, gate, "MALFORMED_DECISION", Some(&review.text))?;
                    self.finalize(&run_id, "blocked", tokens)?;
                    return self
                        .block_task(task, &issue, gate.as_str(), "MALFORMED_DECISION", Some(detail))
                        .await;
                }
            }
            if let Some(outcome) = self.throttle_checkpoint(&task)? {
                self.finalize(&run_id, "paused", tokens)?;
                return Ok(outcome);
            }
        }

        // -- pull request ------------------------------------------------
        let pr_number = match session.pr_url.as_deref().or(recovery.pr_url.as_deref()) {
            Some(url) => pr_number_from_url(url).ok_or_else(|| {
                EngineError::Validation(format!("unparseable PR url: {url}"))
            })?,
            None => {
                let upstream = self.deps.host.get_issue(&self.repo, issue.number).await?;
                let pr = self
                    .deps
                    .host
                    .create_pr(
                        &self.repo,
                        &branch,
                        &self.config.bot_branch,
                        &upstream.title,
                        &format!("Closes #{}", issue.number),
                    )
                    .await?;
                pr.number
            }
        };

        // -- ci gate -----------------------------------------------------
        let mut head_sha_at_ci = String::new();
        let mut polls = 0u32;
        loop {
            let pr = self.deps.host.get_pr(&self.repo, pr_number).await?;
            head_sha_at_ci = pr.head_sha.clone();
            let (pending, failed) = required_check_state(
                self.deps.host.as_ref(),
                &self.repo,
                &pr.base_ref,
                &pr.head_sha,
            )
            .await?;
            if !failed.is_empty() {
                let signature = failure_signature(&failed);
                let attempt = self
                    .deps
                    .store
                    .bump_triage_attempt(&self.repo, issue.number, &signature, self.clock.epoch_ms())?
                    .attempts;
                let payload = classify_ci_failure(&failed, attempt, self.ci_max_attempts);
                let mut record = GateResultRecord::pending(&run_id, Gate::Ci);
                record.status = GateStatus::Fail;
                record.reason = Some(format!("{:?}", payload.classification).to_lowercase());
                record.url = failed[0].url.clone();
                record.pr_number = Some(pr_number);
                record.pr_url = Some(pr.url.clone());
                record.classifier_version = Some(payload.version);
                record.classifier_payload = Some(payload.to_json());
                self.deps.store.upsert_run_gate_result(&record)?;
                let excerpt: String = failed
                    .iter()
                    .filter_map(|c| c.log_excerpt.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n---\n");
                if !excerpt.is_empty() {
                    self.deps.store.record_run_gate_artifact(
                        &run_id,
                        Gate::Ci,
                        "failure_excerpt",
                        &excerpt,
                    )?;
                }
                self.finalize(&run_id, "blocked", tokens)?;
                return self
                    .block_task(task, &issue, "ci-failure", "CI_FAILED", Some(signature))
                    .await;
            }
            if pending.is_empty() {
                let mut record = GateResultRecord::pending(&run_id, Gate::Ci);
                record.status = GateStatus::Pass;
                record.command = Some("required-checks".to_string());
                record.pr_number = Some(pr_number);
                record.pr_url = Some(pr.url.clone());
                self.deps.store.upsert_run_gate_result(&record)?;
                break;
            }
            polls += 1;
            if polls >= self.ci_poll_limit {
                self.fail_gate(&run_id, Gate::Ci, "CI_TIMEOUT", None)?;
                self.finalize(&run_id, "blocked", tokens)?;
                return self
                    .block_task(task, &issue, "ci-timeout", "CI_TIMEOUT", None)
                    .await;
            }
            tokio::time::sleep(self.ci_poll_interval).await;
        }

        if let Some(outcome) = self.throttle_checkpoint(&task)? {
            self.finalize(&run_id, "paused", tokens)?;
            return Ok(outcome);
        }

        // -- pr_evidence gate --------------------------------------------
        let pr = self.deps.host.get_pr(&self.repo, pr_number).await?;
        let evidence_failure = if pr.state != ralph_hosting::PrState::Open {
            Some("PR_NOT_OPEN")
        } else if !pr.head_ref.starts_with("bot/") {
            Some("HEAD_NOT_BOT_OWNED")
        } else if pr.head_sha != head_sha_at_ci {
            Some("HEAD_MOVED_SINCE_CI")
        } else {
            None
        };
        if let Some(reason) = evidence_failure {
            self.fail_gate(&run_id, Gate::PrEvidence, reason, None)?;
            self.finalize(&run_id, "blocked", tokens)?;
            return self
                .block_task(task, &issue, "pr-evidence", reason, None)
                .await;
        }
        let mut record = GateResultRecord::pending(&run_id, Gate::PrEvidence);
        record.status = GateStatus::Pass;
        record.url = Some(pr.url.clone());
        record.pr_number = Some(pr_number);
        record.pr_url = Some(pr.url.clone());
        self.deps.store.upsert_run_gate_result(&record)?;

        // -- merge -------------------------------------------------------
        match merge_task_pr(
            self.deps.host.as_ref(),
            &self.repo,
            pr_number,
            &self.config,
            self.merge_update_retries,
        )
        .await?
        {
            MergeOutcome::Merged { pr_url, .. } => {
                self.finalize(&run_id, "success", tokens)?;
                let completed_at = self.clock.epoch_ms();
                self.park(&task.path, TaskStatus::Done, move |t| {
                    t.completed_at = Some(completed_at);
                })?;
                let _ = self
                    .deps
                    .host
                    .remove_label(&self.repo, issue.number, IN_PROGRESS_LABEL)
                    .await;
                tracing::info!(repo = %self.repo, task = %task.path, pr = %pr_url, "task merged");
                Ok(TickOutcome::Completed {
                    task_path: task.path,
                    completion: CompletionKind::Pr,
                })
            }
            MergeOutcome::ChecksPending { .. } => {
                self.finalize(&run_id, "blocked", tokens)?;
                self.block_task(task, &issue, "merge", "CHECKS_PENDING_AT_MERGE", None).await
            }
            MergeOutcome::ChecksFailed { failed } => {
                let signature = failure_signature(&failed);
                self.finalize(&run_id, "blocked", tokens)?;
                self.block_task(task, &issue, "ci-failure", "CI_FAILED_AT_MERGE", Some(signature))
                    .await
            }
            MergeOutcome::BlockedAutoUpdate { attempts } => {
                self.finalize(&run_id, "blocked", tokens)?;
                self.block_task(
                    task,
                    &issue,
                    "auto-update",
                    "BASE_BRANCH_CONTENTION",
                    Some(format!("{attempts} update attempts")),
                )
                .await
            }
        }
    }

    /// Hard-throttle checkpoint: called at gate boundaries; parks the task
    /// back in the queue when new spending is forbidden.
    fn throttle_checkpoint(&self, task: &TaskRecord) -> Result<Option<TickOutcome>, EngineError> {
        if !(self.hard_throttled)() {
            return Ok(None);
        }
        tracing::info!(repo = %self.repo, task = %task.path, "hard throttle: pausing at checkpoint");
        self.park(&task.path, TaskStatus::Queued, |_| {})?;
        Ok(Some(TickOutcome::Requeued { task_path: task.path.clone() }))
    }

    fn fail_gate(
        &self,
        run_id: &str,
        gate: Gate,
        reason: &str,
        artifact_text: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut record = GateResultRecord::pending(run_id, gate);
        record.status = GateStatus::Fail;
        record.reason = Some(reason.to_string());
        self.deps.store.upsert_run_gate_result(&record)?;
        if let Some(text) = artifact_text {
            self.deps.store.record_run_gate_artifact(run_id, gate, "note", text)?;
        }
        Ok(())
    }

    fn finalize(
        &self,
        run_id: &str,
        outcome: &str,
        tokens: Option<TokenTotals>,
    ) -> Result<(), EngineError> {
        self.deps
            .store
            .finalize_run(run_id, outcome, self.clock.epoch_ms(), tokens)?;
        Ok(())
    }

    /// Move a task to `target` from whatever non-terminal status it holds,
    /// walking through in-progress when the graph demands it.
    fn park(
        &self,
        task_path: &str,
        target: TaskStatus,
        mutate: impl Fn(&mut TaskRecord),
    ) -> Result<TaskRecord, EngineError> {
        let current = self.deps.queue.get(task_path)?.status;
        if TaskStatus::can_transition(current, target) {
            return Ok(self.deps.queue.transition(task_path, current, target, &mut |t| {
                mutate(t)
            })?);
        }
        // Starting → terminal statuses pass through in-progress.
        let task = self.deps.queue.transition(
            task_path,
            current,
            TaskStatus::InProgress,
            &mut |_| {},
        )?;
        Ok(self
            .deps
            .queue
            .transition(task_path, task.status, target, &mut |t| mutate(t))?)
    }

    async fn block_task(
        &self,
        task: TaskRecord,
        issue: &IssueRef,
        source: &str,
        reason: &str,
        details: Option<String>,
    ) -> Result<TickOutcome, EngineError> {
        let now_ms = self.clock.epoch_ms();
        let key = format!("{}:block:{}", task.path, reason);
        let claim = self.deps.store.record_key(
            "writeback",
            &key,
            &serde_json::json!({"task": task.path, "source": source, "reason": reason}),
            now_ms,
        )?;
        if claim == IdempotencyClaim::Claimed {
            if let Err(e) = apply_labels(
                self.deps.host.as_ref(),
                &self.repo,
                issue.number,
                &[BLOCKED_LABEL.to_string()],
            )
            .await
            {
                // A transient writeback failure releases the key so the
                // next attempt retries the label.
                if e.kind() == ralph_core::ErrorKind::Transient {
                    self.deps.store.delete_key("writeback", &key)?;
                }
                tracing::warn!(task = %task.path, error = %e, "blocked-label writeback failed");
            }
        }
        let source = source.to_string();
        let reason = reason.to_string();
        let source_for_task = source.clone();
        let reason_for_task = reason.clone();
        self.park(&task.path, TaskStatus::Blocked, move |t| {
            t.blocked_source = Some(source_for_task.clone());
            t.blocked_reason = Some(reason_for_task.clone());
            t.blocked_details = details.clone();
            t.blocked_at = Some(now_ms);
        })?;
        Ok(TickOutcome::Blocked { task_path: task.path, source, reason })
    }

    async fn escalate_task(
        &self,
        task: TaskRecord,
        issue: &IssueRef,
        fingerprint_kind: &str,
    ) -> Result<TickOutcome, EngineError> {
        let fingerprint = format!("{fingerprint_kind}:{}#{}", self.repo, issue.number);
        let body = format!(
            "ralph escalated task `{}`: {} requires a human decision.",
            task.path, fingerprint_kind
        );
        if let Err(e) = write_alert(
            self.deps.host.as_ref(),
            self.deps.store.as_ref(),
            &self.repo,
            issue.number,
            &fingerprint,
            &body,
            self.clock.epoch_ms(),
        )
        .await
        {
            tracing::warn!(task = %task.path, error = %e, "escalation writeback failed");
        }
        self.park(&task.path, TaskStatus::Escalated, |_| {})?;
        Ok(TickOutcome::Escalated { task_path: task.path })
    }

    async fn escalate_termination(
        &self,
        task: TaskRecord,
        issue: &IssueRef,
        run_id: &str,
        termination: &TerminationReason,
        tokens: Option<TokenTotals>,
    ) -> Result<TickOutcome, EngineError> {
        let kind = match termination {
            TerminationReason::WatchdogTimeout { .. } => "watchdog",
            TerminationReason::LoopTrip(_) => "loop-trip",
            TerminationReason::Stall => "stall",
        };
        if let TerminationReason::LoopTrip(snapshot) = termination {
            // The trip signature feeds the autopilot's attempt budget.
            let signature = format!("loop:{}", snapshot.top_file);
            self.deps.store.bump_triage_attempt(
                &self.repo,
                issue.number,
                &signature,
                self.clock.epoch_ms(),
            )?;
            self.deps.store.record_run_gate_artifact(
                run_id,
                Gate::Preflight,
                "note",
                &serde_json::to_string(snapshot).unwrap_or_default(),
            )?;
        }
        self.finalize(run_id, "escalated", tokens)?;
        self.escalate_task(task, issue, kind).await
    }
}

/// Apply labels one at a time, retrying exactly once after creating a
/// missing label. On a mid-operation failure the already-applied labels
/// are rolled back, but only for non-transient errors (a transient error
/// will be retried wholesale).
pub(crate) async fn apply_labels(
    host: &dyn HostingClient,
    repo: &str,
    number: u64,
    labels: &[String],
) -> Result<(), EngineError> {
    let mut applied: Vec<String> = Vec::new();
    for label in labels {
        let single = [label.clone()];
        let result = match host.add_labels(repo, number, &single).await {
            Err(e) if e.is_label_missing() => {
                host.create_label(repo, label).await?;
                host.add_labels(repo, number, &single).await
            }
            other => other,
        };
        match result {
            Ok(()) => applied.push(label.clone()),
            Err(e) => {
                if e.kind() != ralph_core::ErrorKind::Transient {
                    for done in &applied {
                        let _ = host.remove_label(repo, number, done).await;
                    }
                }
                return Err(e.into());
            }
        }
    }
    Ok(())
}

/// Trailing number of a `/pull/<n>` URL.
pub(crate) fn pr_number_from_url(url: &str) -> Option<u64> {
    let (_, rest) = url.split_once("/pull/")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
