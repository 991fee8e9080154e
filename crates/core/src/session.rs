// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and artifact layout.
//!
//! A session is one agent subprocess instance. Its id doubles as a path
//! component under the sessions directory, so it must never be able to
//! escape it.

use std::path::{Path, PathBuf};

/// Check whether a session id is safe to use as a path component.
///
/// Safe ids match `^[A-Za-z0-9._-]+$` and are never `.` or `..`.
pub fn is_safe_session_id(id: &str) -> bool {
    if id.is_empty() || id == "." || id == ".." {
        return false;
    }
    id.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// Paths for one session's on-disk artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub dir: PathBuf,
    pub events_log: PathBuf,
    pub nudges_log: PathBuf,
}

impl SessionPaths {
    /// Resolve the artifact paths for `session_id` under `sessions_dir`.
    ///
    /// Returns `None` when the id is not a safe path component.
    pub fn resolve(sessions_dir: &Path, session_id: &str) -> Option<Self> {
        if !is_safe_session_id(session_id) {
            return None;
        }
        let dir = sessions_dir.join(session_id);
        Some(Self {
            events_log: dir.join("events.jsonl"),
            nudges_log: dir.join("nudges.jsonl"),
            dir,
        })
    }

    /// Delete every session artifact except the events log.
    ///
    /// The events log is the diagnostic record of what the agent did; it
    /// survives the session.
    pub fn cleanup_preserving_events(&self) -> std::io::Result<()> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path == self.events_log {
                continue;
            }
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
