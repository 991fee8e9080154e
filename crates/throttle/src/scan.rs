// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message-store scanning.
//!
//! The agent writes one `msg_*.json` per message under
//! `<data_dir>/sessions/<session>/`. We only pay attention to assistant
//! messages from the configured provider; file mtimes pre-filter the walk
//! so old sessions are never parsed.

use serde::Deserialize;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// One token-consuming assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEvent {
    pub ts_ms: u64,
    pub tokens: u64,
}

#[derive(Debug, Deserialize)]
struct StoredMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    ts: u64,
    #[serde(default)]
    usage: StoredUsage,
}

#[derive(Debug, Default, Deserialize)]
struct StoredUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    reasoning_tokens: u64,
}

/// Scan one profile's message store for assistant usage events at or after
/// `min_ts_ms`.
///
/// Unreadable or malformed files are skipped with a warning; the scan is
/// advisory and must never wedge the scheduler.
pub fn scan_profile_usage(data_dir: &Path, provider_id: &str, min_ts_ms: u64) -> Vec<UsageEvent> {
    let sessions_dir = data_dir.join("sessions");
    let sessions = match std::fs::read_dir(&sessions_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut events = Vec::new();
    for session in sessions.flatten() {
        let session_path = session.path();
        if !session_path.is_dir() {
            continue;
        }
        let messages = match std::fs::read_dir(&session_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %session_path.display(), error = %e, "unreadable session dir");
                continue;
            }
        };
        for message in messages.flatten() {
            let path = message.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.starts_with("msg_") || !name.ends_with(".json") {
                continue;
            }
            // mtime pre-filter: skip files that cannot contain in-window events
            let mtime_ms = message
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);
            if let Some(mtime_ms) = mtime_ms {
                if mtime_ms < min_ts_ms {
                    continue;
                }
            }
            match parse_message(&path, provider_id) {
                Ok(Some(event)) if event.ts_ms >= min_ts_ms => events.push(event),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping message file");
                }
            }
        }
    }
    events.sort_by_key(|e| e.ts_ms);
    events
}

fn parse_message(path: &Path, provider_id: &str) -> Result<Option<UsageEvent>, std::io::Error> {
    let text = std::fs::read_to_string(path)?;
    let message: StoredMessage = serde_json::from_str(&text)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if message.role != "assistant" || message.provider != provider_id {
        return Ok(None);
    }
    let tokens = message.usage.input_tokens
        + message.usage.output_tokens
        + message.usage.reasoning_tokens;
    Ok(Some(UsageEvent { ts_ms: message.ts, tokens }))
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
