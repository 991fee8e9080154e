// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert writeback.
//!
//! Alerts land as issue comments carrying an HTML marker derived from the
//! alert fingerprint. The marker plus the idempotency key guarantee at
//! most one effective comment per (issue, fingerprint), across retries and
//! restarts.

use crate::ci::hex_prefix;
use crate::error::EngineError;
use ralph_hosting::HostingClient;
use ralph_storage::{IdempotencyClaim, StateStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Delivery channel name recorded on attempts.
const CHANNEL: &str = "issue-comment";
/// Idempotency scope for alert writebacks.
const SCOPE: &str = "alert-writeback";

/// 12-hex marker id derived from an alert fingerprint.
pub fn alert_marker_id(fingerprint: &str) -> String {
    let digest = Sha256::digest(fingerprint.as_bytes());
    hex_prefix(&digest, 12)
}

/// The HTML marker embedded in alert comments.
pub fn alert_marker(marker_id: &str) -> String {
    format!("<!-- ralph-alert:id={marker_id} -->")
}

/// What a writeback attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub posted_comment: bool,
    pub marker_found: bool,
    pub skipped_comment: bool,
    pub marker_id: String,
}

/// Write an alert comment to an issue, at most once per fingerprint.
pub async fn write_alert(
    host: &dyn HostingClient,
    store: &StateStore,
    repo: &str,
    issue_number: u64,
    fingerprint: &str,
    body: &str,
    now_ms: u64,
) -> Result<AlertOutcome, EngineError> {
    let marker_id = alert_marker_id(fingerprint);
    let marker = alert_marker(&marker_id);

    // The marker in existing comments is the ground truth; the store only
    // accelerates the common path.
    let comments = host.list_issue_comments(repo, issue_number).await?;
    if comments.iter().any(|c| c.body.contains(&marker)) {
        store.record_alert_attempt(
            fingerprint,
            CHANNEL,
            &marker_id,
            "issue",
            issue_number,
            "skipped",
            None,
            None,
            now_ms,
        )?;
        return Ok(AlertOutcome {
            posted_comment: false,
            marker_found: true,
            skipped_comment: true,
            marker_id,
        });
    }

    let key = format!("{repo}#{issue_number}:{marker_id}");
    let claim = store.record_key(
        SCOPE,
        &key,
        &serde_json::json!({"repo": repo, "issue": issue_number, "fingerprint": fingerprint}),
        now_ms,
    )?;
    if claim == IdempotencyClaim::Duplicate {
        // Someone claimed it but the marker is absent: a prior attempt is
        // in flight or failed mid-way; skip rather than double-post.
        store.record_alert_attempt(
            fingerprint,
            CHANNEL,
            &marker_id,
            "issue",
            issue_number,
            "skipped",
            None,
            Some("key already claimed"),
            now_ms,
        )?;
        return Ok(AlertOutcome {
            posted_comment: false,
            marker_found: false,
            skipped_comment: true,
            marker_id,
        });
    }

    let full_body = format!("{body}\n\n{marker}");
    match host.post_issue_comment(repo, issue_number, &full_body).await {
        Ok(comment) => {
            store.record_alert_attempt(
                fingerprint,
                CHANNEL,
                &marker_id,
                "issue",
                issue_number,
                "success",
                Some(&comment.id),
                None,
                now_ms,
            )?;
            Ok(AlertOutcome {
                posted_comment: true,
                marker_found: false,
                skipped_comment: false,
                marker_id,
            })
        }
        Err(e) => {
            store.record_alert_attempt(
                fingerprint,
                CHANNEL,
                &marker_id,
                "issue",
                issue_number,
                "failed",
                None,
                Some(&e.to_string()),
                now_ms,
            )?;
            // Confirmed failure: release the key so a retry can claim it.
            store.delete_key(SCOPE, &key)?;
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
