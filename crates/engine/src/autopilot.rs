// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation autopilot.
//!
//! Reads the consultant's structured decision block and applies the
//! automatic resolution at most once per (repo, issue, signature), with a
//! hard attempt budget. The eligibility rules are a closed list; anything
//! outside them stays with a human.

use crate::ci::hex_prefix;
use crate::error::EngineError;
use ralph_config::AutopilotConfig;
use ralph_core::task::AutoResolveEntry;
use ralph_core::{IssueRef, TaskRecord, TaskStatus};
use ralph_hosting::HostingClient;
use ralph_storage::{IdempotencyClaim, QueueStore, StateStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Heading that introduces a consultant decision block.
const CONSULTANT_HEADING: &str = "## Consultant Decision";
/// Idempotency scope for autopilot resolutions.
const SCOPE: &str = "autopilot";

/// The consultant's structured decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultantDecision {
    /// Why the task escalated: `watchdog`, `low-confidence`, `blocked`,
    /// `product-gap`, `contract-surface`.
    pub reason_kind: String,
    /// `high`, `medium`, `low`.
    pub confidence: String,
    /// Required when `reason_kind` is `blocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
}

/// Consultant decision parse result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionParse {
    Found(ConsultantDecision),
    NotFound,
    Malformed(String),
}

/// Parse the fenced JSON block under the consultant heading.
pub fn parse_consultant_decision(text: &str) -> DecisionParse {
    let mut lines = text.lines();
    loop {
        match lines.next() {
            Some(line) if line.trim() == CONSULTANT_HEADING => break,
            Some(_) => continue,
            None => return DecisionParse::NotFound,
        }
    }
    let fence = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line.trim().to_string(),
            None => return DecisionParse::Malformed("heading with no block".to_string()),
        }
    };
    if fence != "```json" && fence != "```" {
        return DecisionParse::Malformed(format!("expected fenced block, found {fence:?}"));
    }
    let mut body = String::new();
    for line in lines {
        if line.trim() == "```" {
            return match serde_json::from_str::<ConsultantDecision>(&body) {
                Ok(decision) => DecisionParse::Found(decision),
                Err(e) => DecisionParse::Malformed(format!("decision JSON: {e}")),
            };
        }
        body.push_str(line);
        body.push('\n');
    }
    DecisionParse::Malformed("unterminated decision block".to_string())
}

/// What the autopilot did with an escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutopilotOutcome {
    /// Resolution applied; the caller requeues the task.
    Applied { signature: String },
    /// The closed eligibility rules say no.
    Ineligible { reason: String },
    /// Per-signature budget exhausted.
    BudgetExhausted { attempts: u32 },
    /// A previous attempt already applied this resolution.
    AlreadyApplied,
}

/// The escalation autopilot.
pub struct Autopilot<'a> {
    store: &'a StateStore,
    config: &'a AutopilotConfig,
}

impl<'a> Autopilot<'a> {
    pub fn new(store: &'a StateStore, config: &'a AutopilotConfig) -> Self {
        Self { store, config }
    }

    /// Closed eligibility rules.
    ///
    /// `product-gap` and `contract-surface` always block. `blocked` needs
    /// a dependency issue reference. Otherwise only `watchdog` and
    /// `low-confidence` qualify, and only at `high` confidence.
    pub fn eligibility(decision: &ConsultantDecision) -> Result<(), String> {
        let kind = decision.reason_kind.as_str();
        if kind.contains("product-gap") || kind.contains("contract-surface") {
            return Err(format!("{kind} escalations require a human"));
        }
        match kind {
            "blocked" => {
                let dep = decision.dependency_issue.as_deref().unwrap_or("");
                if dep.parse::<IssueRef>().is_err() {
                    return Err("blocked escalation without a dependency issue".to_string());
                }
                Ok(())
            }
            "watchdog" | "low-confidence" => {
                if decision.confidence == "high" {
                    Ok(())
                } else {
                    Err(format!("{kind} at {} confidence is not auto-resolvable", decision.confidence))
                }
            }
            other => Err(format!("unknown escalation kind {other:?}")),
        }
    }

    /// Stable per-decision signature for the attempt budget.
    pub fn signature(decision: &ConsultantDecision) -> String {
        let mut hasher = Sha256::new();
        hasher.update(decision.reason_kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(decision.dependency_issue.as_deref().unwrap_or("").as_bytes());
        hex_prefix(&hasher.finalize(), 16)
    }

    /// Apply one automatic resolution, repeat-safe.
    pub fn resolve(
        &self,
        task: &mut TaskRecord,
        issue: &IssueRef,
        decision: &ConsultantDecision,
        now_ms: u64,
    ) -> Result<AutopilotOutcome, EngineError> {
        if let Err(reason) = Self::eligibility(decision) {
            return Ok(AutopilotOutcome::Ineligible { reason });
        }
        let signature = Self::signature(decision);

        let attempts = self
            .store
            .get_triage_attempt(&issue.repo(), issue.number, &signature)?
            .map(|a| a.attempts)
            .unwrap_or(0);
        if attempts >= self.config.max_attempts_per_signature {
            return Ok(AutopilotOutcome::BudgetExhausted { attempts });
        }

        let key = format!("{}:{signature}", task.path);
        let claim = self.store.record_key(
            SCOPE,
            &key,
            &serde_json::json!({"task": task.path, "signature": signature}),
            now_ms,
        )?;
        if claim == IdempotencyClaim::Duplicate {
            return Ok(AutopilotOutcome::AlreadyApplied);
        }

        self.store.bump_triage_attempt(&issue.repo(), issue.number, &signature, now_ms)?;
        task.auto_resolve_ledger.push(AutoResolveEntry {
            at_ms: now_ms,
            signature: signature.clone(),
            action: format!("auto-resolve:{}", decision.reason_kind),
            note: decision.resolution_note.clone(),
        });
        task.auto_resolve_last_at = Some(now_ms);
        tracing::info!(task = %task.path, signature = %signature, "autopilot applied resolution");
        Ok(AutopilotOutcome::Applied { signature })
    }
}

/// One autopilot pass over a repo's escalated tasks.
///
/// The consultant answers on the issue itself; the latest comment with a
/// decision block wins. An applied resolution only touches the task's
/// ledger — the escalation note stays as the human-readable record.
pub async fn autopilot_tick(
    host: &dyn HostingClient,
    store: &StateStore,
    queue: &dyn QueueStore,
    config: &AutopilotConfig,
    repo: &str,
    now_ms: u64,
) -> Result<u32, EngineError> {
    let mut applied = 0;
    for task in queue.list()? {
        if task.repo != repo || task.status != TaskStatus::Escalated {
            continue;
        }
        let Ok(issue) = task.issue.parse::<IssueRef>() else {
            continue;
        };
        let comments = host.list_issue_comments(repo, issue.number).await?;
        let decision = comments.iter().rev().find_map(|c| {
            match parse_consultant_decision(&c.body) {
                DecisionParse::Found(decision) => Some(decision),
                _ => None,
            }
        });
        let Some(decision) = decision else { continue };
        let mut updated = task.clone();
        match Autopilot::new(store, config).resolve(&mut updated, &issue, &decision, now_ms)? {
            AutopilotOutcome::Applied { signature } => {
                queue.update(&updated, TaskStatus::Escalated)?;
                tracing::info!(task = %task.path, %signature, "escalation auto-resolved");
                applied += 1;
            }
            AutopilotOutcome::Ineligible { reason } => {
                tracing::debug!(task = %task.path, %reason, "escalation stays with a human");
            }
            AutopilotOutcome::BudgetExhausted { attempts } => {
                tracing::debug!(task = %task.path, attempts, "autopilot budget exhausted");
            }
            AutopilotOutcome::AlreadyApplied => {}
        }
    }
    Ok(applied)
}

#[cfg(test)]
#[path = "autopilot_tests.rs"]
mod tests;
