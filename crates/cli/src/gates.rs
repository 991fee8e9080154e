// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `gates` command: project the latest run's gate state as the
//! stable version-2 JSON schema.
//!
//! Reads the durable store directly (read-only), so it works with or
//! without a running daemon, and serves forward-readable schemas with
//! exit 0. A forward-incompatible store yields exit 2 with a structured
//! error envelope.

use ralph_engine::CLASSIFIER_VERSION;
use ralph_storage::{RunGateState, StateStore, StoreError};
use serde_json::json;
use std::path::Path;

/// Schema version of the gates JSON output.
pub const GATES_SCHEMA_VERSION: u32 = 2;

/// Build the gates JSON and its exit code.
pub fn collect_gates(db_path: &Path, repo: &str, issue_number: u64) -> (serde_json::Value, i32) {
    let store = match StateStore::open_read_only(db_path) {
        Ok(store) => store,
        Err(e) => return (error_envelope(repo, issue_number, &e), exit_code_for(&e)),
    };
    match store.latest_run_gate_state_for_issue(repo, issue_number) {
        Ok(Some(state)) => (project(repo, issue_number, &state), 0),
        Ok(None) => (
            json!({
                "version": GATES_SCHEMA_VERSION,
                "repo": repo,
                "issueNumber": issue_number,
                "runId": null,
                "gates": [],
                "artifacts": [],
                "error": null,
            }),
            0,
        ),
        Err(e) => (error_envelope(repo, issue_number, &e), exit_code_for(&e)),
    }
}

fn exit_code_for(e: &StoreError) -> i32 {
    e.kind().exit_code()
}

fn error_envelope(repo: &str, issue_number: u64, e: &StoreError) -> serde_json::Value {
    let mut error = json!({
        "code": e.code(),
        "message": e.to_string(),
    });
    if let StoreError::ForwardIncompatible { schema_version, max_supported, max_writable } = e {
        error["schemaVersion"] = json!(schema_version);
        error["supportedRange"] = json!([1, max_supported]);
        error["writableRange"] = json!([1, max_writable]);
    }
    json!({
        "version": GATES_SCHEMA_VERSION,
        "repo": repo,
        "issueNumber": issue_number,
        "runId": null,
        "gates": [],
        "artifacts": [],
        "error": error,
    })
}

fn project(repo: &str, issue_number: u64, state: &RunGateState) -> serde_json::Value {
    let gates: Vec<serde_json::Value> = state
        .gates
        .iter()
        .map(|gate| {
            let mut value = json!({
                "name": gate.gate.as_str(),
                "status": gate.status.as_str(),
            });
            if let Some(command) = &gate.command {
                value["command"] = json!(command);
            }
            if let Some(skip_reason) = &gate.skip_reason {
                value["skipReason"] = json!(skip_reason);
            }
            if let Some(reason) = &gate.reason {
                value["reason"] = json!(reason);
            }
            if let Some(url) = &gate.url {
                value["url"] = json!(url);
            }
            if let Some(pr_number) = gate.pr_number {
                value["prNumber"] = json!(pr_number);
            }
            if let Some(pr_url) = &gate.pr_url {
                value["prUrl"] = json!(pr_url);
            }
            if let Some(version) = gate.classifier_version {
                value["classifierVersion"] = json!(version);
                if version == CLASSIFIER_VERSION {
                    if let Some(payload) = &gate.classifier_payload {
                        value["classifierPayload"] = payload.clone();
                        value["classifierSource"] = json!("persisted");
                    }
                } else {
                    // A newer daemon wrote a payload this binary cannot
                    // interpret; say so rather than mis-render it.
                    value["classifierUnsupportedVersion"] = json!(true);
                }
            }
            value
        })
        .collect();

    let artifacts: Vec<serde_json::Value> = state
        .artifacts
        .iter()
        .map(|artifact| {
            json!({
                "id": artifact.id,
                "gate": artifact.gate.as_str(),
                "kind": artifact.kind,
                "truncated": artifact.truncated,
                "truncationMode": artifact.truncation_mode.as_str(),
                "artifactPolicyVersion": artifact.policy_version,
                "originalChars": artifact.original_chars,
                "originalLines": artifact.original_lines,
                "content": artifact.content,
            })
        })
        .collect();

    json!({
        "version": GATES_SCHEMA_VERSION,
        "repo": repo,
        "issueNumber": issue_number,
        "runId": state.run.id,
        "gates": gates,
        "artifacts": artifacts,
        "error": null,
    })
}

/// Render the gates state as human-readable text.
pub fn render_text(value: &serde_json::Value) -> String {
    let mut out = String::new();
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        out.push_str(&format!(
            "error [{}]: {}\n",
            error["code"].as_str().unwrap_or("unknown"),
            error["message"].as_str().unwrap_or(""),
        ));
        return out;
    }
    out.push_str(&format!(
        "{}#{} (run {})\n",
        value["repo"].as_str().unwrap_or(""),
        value["issueNumber"],
        value["runId"].as_str().unwrap_or("-"),
    ));
    if let Some(gates) = value["gates"].as_array() {
        for gate in gates {
            let mut line = format!(
                "  {:<15} {}",
                gate["name"].as_str().unwrap_or(""),
                gate["status"].as_str().unwrap_or(""),
            );
            if let Some(reason) = gate["reason"].as_str() {
                line.push_str(&format!(" ({reason})"));
            }
            if let Some(url) = gate["url"].as_str() {
                line.push_str(&format!(" {url}"));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
