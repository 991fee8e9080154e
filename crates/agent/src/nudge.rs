// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator nudges.
//!
//! The CLI appends `nudge` records to the session's `nudges.jsonl`; the
//! supervisor appends `delivery` records as it drains them at safe
//! checkpoints. The file is the queue: pending = nudges with neither a
//! successful delivery nor a drop record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Nudge log errors
#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nudge log parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One record in `nudges.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NudgeRecord {
    /// An operator message awaiting delivery.
    Nudge { id: String, ts: u64, message: String },
    /// One delivery attempt for a nudge.
    Delivery {
        id: String,
        ts: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Set when the nudge was dropped after exhausting its attempts.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        dropped: bool,
    },
}

/// A nudge still awaiting delivery, with its failure count so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNudge {
    pub id: String,
    pub message: String,
    pub failed_attempts: u32,
}

/// Append-only nudge queue over `nudges.jsonl`.
pub struct NudgeQueue {
    path: PathBuf,
    max_attempts: u32,
}

impl NudgeQueue {
    pub fn new(path: impl Into<PathBuf>, max_attempts: u32) -> Self {
        Self { path: path.into(), max_attempts: max_attempts.max(1) }
    }

    /// Append an operator nudge (the CLI side).
    pub fn push(&self, id: &str, message: &str, ts: u64) -> Result<(), NudgeError> {
        self.append(&NudgeRecord::Nudge {
            id: id.to_string(),
            ts,
            message: message.to_string(),
        })
    }

    /// Read the log and compute the pending set in append order.
    pub fn pending(&self) -> Result<Vec<PendingNudge>, NudgeError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut order: Vec<String> = Vec::new();
        let mut messages: HashMap<String, String> = HashMap::new();
        let mut failures: HashMap<String, u32> = HashMap::new();
        let mut settled: HashMap<String, bool> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: NudgeRecord = serde_json::from_str(line)?;
            match record {
                NudgeRecord::Nudge { id, message, .. } => {
                    if !messages.contains_key(&id) {
                        order.push(id.clone());
                    }
                    messages.insert(id, message);
                }
                NudgeRecord::Delivery { id, ok, dropped, .. } => {
                    if ok || dropped {
                        settled.insert(id, true);
                    } else {
                        *failures.entry(id).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(order
            .into_iter()
            .filter(|id| !settled.get(id).copied().unwrap_or(false))
            .filter_map(|id| {
                let message = messages.get(&id)?.clone();
                Some(PendingNudge {
                    failed_attempts: failures.get(&id).copied().unwrap_or(0),
                    id,
                    message,
                })
            })
            .collect())
    }

    /// Drain pending nudges through `deliver`, sequentially.
    ///
    /// A delivery failure stops the drain (the next checkpoint retries);
    /// a nudge that has exhausted `max_attempts` is dropped with a record
    /// saying so. Returns the number of nudges delivered.
    pub async fn drain<F, Fut>(&self, now_ms: u64, mut deliver: F) -> Result<usize, NudgeError>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let mut delivered = 0;
        for nudge in self.pending()? {
            if nudge.failed_attempts >= self.max_attempts {
                tracing::warn!(nudge = %nudge.id, "dropping nudge after {} failed attempts", nudge.failed_attempts);
                self.append(&NudgeRecord::Delivery {
                    id: nudge.id,
                    ts: now_ms,
                    ok: false,
                    error: Some("max attempts exhausted".to_string()),
                    dropped: true,
                })?;
                continue;
            }
            match deliver(nudge.message.clone()).await {
                Ok(()) => {
                    self.append(&NudgeRecord::Delivery {
                        id: nudge.id,
                        ts: now_ms,
                        ok: true,
                        error: None,
                        dropped: false,
                    })?;
                    delivered += 1;
                }
                Err(error) => {
                    self.append(&NudgeRecord::Delivery {
                        id: nudge.id,
                        ts: now_ms,
                        ok: false,
                        error: Some(error),
                        dropped: false,
                    })?;
                    break;
                }
            }
        }
        Ok(delivered)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record a successful delivery (supervisor side).
    pub fn record_success(&self, id: &str, ts: u64) -> Result<(), NudgeError> {
        self.append(&NudgeRecord::Delivery {
            id: id.to_string(),
            ts,
            ok: true,
            error: None,
            dropped: false,
        })
    }

    /// Record a failed delivery attempt (supervisor side).
    pub fn record_failure(&self, id: &str, ts: u64, error: &str) -> Result<(), NudgeError> {
        self.append(&NudgeRecord::Delivery {
            id: id.to_string(),
            ts,
            ok: false,
            error: Some(error.to_string()),
            dropped: false,
        })
    }

    /// Record a drop after exhausted attempts (supervisor side).
    pub fn record_dropped(&self, id: &str, ts: u64) -> Result<(), NudgeError> {
        self.append(&NudgeRecord::Delivery {
            id: id.to_string(),
            ts,
            ok: false,
            error: Some("max attempts exhausted".to_string()),
            dropped: true,
        })
    }

    fn append(&self, record: &NudgeRecord) -> Result<(), NudgeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }
}

/// Append a nudge to a session's log without constructing a queue (CLI
/// convenience).
pub fn append_nudge(path: &Path, id: &str, message: &str, ts: u64) -> Result<(), NudgeError> {
    NudgeQueue::new(path, 1).push(id, message, ts)
}

#[cfg(test)]
#[path = "nudge_tests.rs"]
mod tests;
