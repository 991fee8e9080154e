// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate vocabulary and run records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The canonical gate sequence a run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Preflight,
    PlanReview,
    ProductReview,
    DevexReview,
    Ci,
    PrEvidence,
}

impl Gate {
    /// All gates in execution order.
    pub const CANONICAL: [Gate; 6] = [
        Gate::Preflight,
        Gate::PlanReview,
        Gate::ProductReview,
        Gate::DevexReview,
        Gate::Ci,
        Gate::PrEvidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Preflight => "preflight",
            Gate::PlanReview => "plan_review",
            Gate::ProductReview => "product_review",
            Gate::DevexReview => "devex_review",
            Gate::Ci => "ci",
            Gate::PrEvidence => "pr_evidence",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gate::CANONICAL
            .iter()
            .find(|g| g.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown gate: {s:?}"))
    }
}

/// Status of one gate within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Pass,
    Fail,
    Skip,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pending => "pending",
            GateStatus::Pass => "pass",
            GateStatus::Fail => "fail",
            GateStatus::Skip => "skip",
        }
    }

    /// `pass` and `fail` never change again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GateStatus::Pass | GateStatus::Fail)
    }

    /// Monotonic update rule: pending may become anything; skip may still
    /// resolve to pass/fail; pass/fail only re-assert themselves.
    pub fn can_become(&self, next: GateStatus) -> bool {
        match self {
            GateStatus::Pending => true,
            GateStatus::Skip => true,
            GateStatus::Pass | GateStatus::Fail => *self == next,
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GateStatus::Pending),
            "pass" => Ok(GateStatus::Pass),
            "fail" => Ok(GateStatus::Fail),
            "skip" => Ok(GateStatus::Skip),
            other => Err(format!("unknown gate status: {other:?}")),
        }
    }
}

/// Per-run token totals, complete or absent as a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
}

impl TokenTotals {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.reasoning
    }
}

/// One attempt of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub repo: String,
    pub issue_number: u64,
    pub task_ref: String,
    pub attempt_kind: String,
    pub started_at_ms: u64,
    pub completed_at_ms: Option<u64>,
    pub outcome: Option<String>,
    pub tokens: Option<TokenTotals>,
}

/// Stored result for one (run, gate) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResultRecord {
    pub run_id: String,
    pub gate: Gate,
    pub status: GateStatus,
    pub command: Option<String>,
    pub skip_reason: Option<String>,
    pub reason: Option<String>,
    pub url: Option<String>,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub classifier_version: Option<u32>,
    pub classifier_payload: Option<serde_json::Value>,
}

impl GateResultRecord {
    /// A fresh pending row for a gate.
    pub fn pending(run_id: &str, gate: Gate) -> Self {
        Self {
            run_id: run_id.to_string(),
            gate,
            status: GateStatus::Pending,
            command: None,
            skip_reason: None,
            reason: None,
            url: None,
            pr_number: None,
            pr_url: None,
            classifier_version: None,
            classifier_payload: None,
        }
    }
}

/// Stored gate artifact (possibly truncated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: i64,
    pub run_id: String,
    pub gate: Gate,
    pub kind: String,
    pub content: String,
    pub truncated: bool,
    pub truncation_mode: crate::artifacts::TruncationMode,
    pub original_chars: u64,
    pub original_lines: u64,
    pub policy_version: u32,
}

/// The latest run for an issue with its gate rows and artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunGateState {
    pub run: RunRecord,
    pub gates: Vec<GateResultRecord>,
    pub artifacts: Vec<ArtifactRecord>,
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
