// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CI gate support: bounded waits and the failure triage classifier.
//!
//! The classifier output is a versioned payload persisted on the ci gate
//! row; downstream consumers (gates CLI, autopilot) read it back by
//! version and must tolerate versions they do not know.

use ralph_hosting::{CheckRun, CheckStatus, HostingClient};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version stamped on every classifier payload.
pub const CLASSIFIER_VERSION: u32 = 1;

/// What kind of failure CI produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiClassification {
    Regression,
    Flake,
    Infra,
}

/// What the worker should do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiAction {
    /// Re-run checks and continue the same run.
    Resume,
    /// Spawn a fresh fix attempt.
    Spawn,
    /// Park the task for a human.
    Quarantine,
}

/// Versioned CI triage payload persisted on the gate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiTriagePayload {
    pub kind: String,
    pub version: u32,
    /// Stable fingerprint of the failure set.
    pub signature: String,
    pub classification: CiClassification,
    pub action: CiAction,
    pub reasons: Vec<String>,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl CiTriagePayload {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

const INFRA_MARKERS: [&str; 5] = [
    "runner lost communication",
    "no space left on device",
    "network error",
    "connection reset",
    "exceeded the maximum execution time",
];

const FLAKE_MARKERS: [&str; 4] =
    ["flaky", "timed out waiting for", "temporarily unavailable", "retrying"];

/// Classify a set of failed checks into a triage payload.
pub fn classify_ci_failure(
    failed: &[CheckRun],
    attempt: u32,
    max_attempts: u32,
) -> CiTriagePayload {
    let mut reasons = Vec::new();
    let mut infra_hits = 0;
    let mut flake_hits = 0;
    for check in failed {
        let log = check.log_excerpt.as_deref().unwrap_or("").to_ascii_lowercase();
        if let Some(marker) = INFRA_MARKERS.iter().find(|m| log.contains(**m)) {
            infra_hits += 1;
            reasons.push(format!("{}: {}", check.name, marker));
        } else if let Some(marker) = FLAKE_MARKERS.iter().find(|m| log.contains(**m)) {
            flake_hits += 1;
            reasons.push(format!("{}: {}", check.name, marker));
        } else {
            reasons.push(format!("{}: unmatched failure", check.name));
        }
    }

    let classification = if !failed.is_empty() && infra_hits == failed.len() {
        CiClassification::Infra
    } else if !failed.is_empty() && infra_hits + flake_hits == failed.len() {
        CiClassification::Flake
    } else {
        CiClassification::Regression
    };

    let action = match classification {
        // Infra and flake failures retry until the budget runs out.
        CiClassification::Infra | CiClassification::Flake => {
            if attempt < max_attempts {
                CiAction::Resume
            } else {
                CiAction::Quarantine
            }
        }
        CiClassification::Regression => {
            if attempt < max_attempts {
                CiAction::Spawn
            } else {
                CiAction::Quarantine
            }
        }
    };

    CiTriagePayload {
        kind: "ci-triage".to_string(),
        version: CLASSIFIER_VERSION,
        signature: failure_signature(failed),
        classification,
        action,
        reasons,
        attempt,
        max_attempts,
    }
}

/// Stable fingerprint over the failed check names and their first log
/// lines.
pub fn failure_signature(failed: &[CheckRun]) -> String {
    let mut names: Vec<String> = failed
        .iter()
        .map(|c| {
            let first_line = c
                .log_excerpt
                .as_deref()
                .and_then(|l| l.lines().next())
                .unwrap_or("");
            format!("{}\u{1}{}", c.name, first_line)
        })
        .collect();
    names.sort();
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

pub(crate) fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in bytes {
        if out.len() >= chars {
            break;
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(chars);
    out
}

/// Resolve the required-check state for a PR head.
///
/// Returns `(pending, failed)` restricted to the checks required on the
/// base branch; checks not yet reported count as pending.
pub async fn required_check_state(
    host: &dyn HostingClient,
    repo: &str,
    base_branch: &str,
    head_sha: &str,
) -> Result<(Vec<String>, Vec<CheckRun>), ralph_hosting::HostingError> {
    let required = host.required_checks(repo, base_branch).await?;
    let runs = host.check_runs(repo, head_sha).await?;
    let mut pending = Vec::new();
    let mut failed = Vec::new();
    for name in &required {
        match runs.iter().find(|r| &r.name == name) {
            Some(run) => match run.status {
                CheckStatus::Pending => pending.push(name.clone()),
                CheckStatus::Failed => failed.push(run.clone()),
                CheckStatus::Passed => {}
            },
            None => pending.push(name.clone()),
        }
    }
    Ok((pending, failed))
}

#[cfg(test)]
#[path = "ci_tests.rs"]
mod tests;
