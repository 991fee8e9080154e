// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-daemon startup lock.
//!
//! A lock directory (mode 0700) plus an owner record guarantee at most one
//! live daemon per control root. On collision the owner is probed:
//! signal-0 liveness, the recorded process start-identity, and a command
//! line sanity check. Healthy and unknown owners refuse (exit 2); only a
//! provably stale owner is evicted, at most three times.

use ralph_core::{write_atomic, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Owner record stored inside the lock directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub version: u32,
    pub daemon_id: String,
    pub pid: u32,
    pub started_at: String,
    /// Platform process start-identity (Linux: starttime from
    /// `/proc/<pid>/stat`). Absent on platforms without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_identity: Option<String>,
}

/// Lock errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "another daemon owns this control root (pid {pid}, started {started_at}); \
         see {owner_path}"
    )]
    Conflict { owner_path: PathBuf, pid: u32, started_at: String },

    #[error(
        "a process may own this control root but its liveness could not be determined \
         (pid {pid}, started {started_at}); see {owner_path}"
    )]
    Unknown { owner_path: PathBuf, pid: u32, started_at: String },

    #[error("stale lock could not be evicted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockError::Conflict { .. } | LockError::Unknown { .. } => ErrorKind::Conflict,
            LockError::RetriesExhausted { .. } | LockError::Io(_) => ErrorKind::Transient,
        }
    }

    /// Conflict and unknown refusals exit with code 2.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

/// Held lock; releases the directory on `release` (or leaks it on crash,
/// where the next daemon's staleness probe cleans up).
#[derive(Debug)]
pub struct StartupLock {
    lock_dir: PathBuf,
}

impl StartupLock {
    pub fn owner_path(&self) -> PathBuf {
        self.lock_dir.join("owner.json")
    }

    /// Remove the lock directory on graceful stop.
    pub fn release(self) {
        let _ = std::fs::remove_file(self.owner_path());
        let _ = std::fs::remove_dir(&self.lock_dir);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum OwnerState {
    Healthy,
    Stale,
    Unknown,
}

/// Acquire the startup lock for a control root.
pub fn acquire_startup_lock(
    lock_dir: &Path,
    daemon_id: &str,
    started_at: &str,
) -> Result<StartupLock, LockError> {
    if let Some(parent) = lock_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let owner_path = lock_dir.join("owner.json");
    let mut evictions = 0u32;
    loop {
        match create_lock_dir(lock_dir) {
            Ok(()) => {
                let record = OwnerRecord {
                    version: 1,
                    daemon_id: daemon_id.to_string(),
                    pid: std::process::id(),
                    started_at: started_at.to_string(),
                    start_identity: process_start_identity(std::process::id()),
                };
                let bytes = serde_json::to_vec_pretty(&record)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                write_atomic(&owner_path, &bytes)?;
                tracing::info!(lock = %lock_dir.display(), "startup lock acquired");
                return Ok(StartupLock { lock_dir: lock_dir.to_path_buf() });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let owner = read_owner_with_retries(&owner_path);
                match classify_owner(owner.as_ref()) {
                    OwnerState::Healthy => {
                        let owner = owner.unwrap_or_else(placeholder_owner);
                        return Err(LockError::Conflict {
                            owner_path,
                            pid: owner.pid,
                            started_at: owner.started_at,
                        });
                    }
                    OwnerState::Unknown => {
                        let owner = owner.unwrap_or_else(placeholder_owner);
                        return Err(LockError::Unknown {
                            owner_path,
                            pid: owner.pid,
                            started_at: owner.started_at,
                        });
                    }
                    OwnerState::Stale => {
                        evictions += 1;
                        if evictions > 3 {
                            return Err(LockError::RetriesExhausted { attempts: evictions });
                        }
                        tracing::warn!(
                            lock = %lock_dir.display(),
                            eviction = evictions,
                            "evicting stale daemon lock"
                        );
                        let _ = std::fs::remove_file(&owner_path);
                        let _ = std::fs::remove_dir_all(lock_dir);
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn placeholder_owner() -> OwnerRecord {
    OwnerRecord {
        version: 1,
        daemon_id: "unknown".to_string(),
        pid: 0,
        started_at: "unknown".to_string(),
        start_identity: None,
    }
}

fn create_lock_dir(lock_dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().mode(0o700).create(lock_dir)
}

fn read_owner_with_retries(owner_path: &Path) -> Option<OwnerRecord> {
    // The owner file is written just after the directory appears; a racing
    // reader may see it missing or half-materialized briefly.
    for attempt in 0..3 {
        if attempt > 0 {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        if let Ok(text) = std::fs::read_to_string(owner_path) {
            if let Ok(record) = serde_json::from_str::<OwnerRecord>(&text) {
                return Some(record);
            }
        }
    }
    None
}

/// Classify the recorded owner.
///
/// Policy: prefer false-refuse over false-acquire. Only a dead PID or a
/// provable start-identity mismatch counts as stale.
fn classify_owner(owner: Option<&OwnerRecord>) -> OwnerState {
    let Some(owner) = owner else {
        // Lock directory with no readable owner record after retries: a
        // crashed writer. Treat as stale.
        return OwnerState::Stale;
    };
    if owner.pid == 0 {
        return OwnerState::Stale;
    }
    let alive = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(owner.pid as i32),
        None,
    );
    match alive {
        Err(nix::errno::Errno::ESRCH) => OwnerState::Stale,
        Err(_) => OwnerState::Unknown,
        Ok(()) => {
            match (owner.start_identity.as_deref(), process_start_identity(owner.pid)) {
                (Some(recorded), Some(current)) => {
                    if recorded == current {
                        OwnerState::Healthy
                    } else {
                        // The PID was recycled by another process.
                        OwnerState::Stale
                    }
                }
                // Without a start-identity probe, fall back to a command
                // line sanity check; anything inconclusive refuses.
                _ => match process_cmdline(owner.pid) {
                    Some(cmdline) if cmdline.contains("ralphd") => OwnerState::Healthy,
                    Some(_) => OwnerState::Unknown,
                    None => OwnerState::Unknown,
                },
            }
        }
    }
}

/// Linux process start-identity: the `starttime` field of
/// `/proc/<pid>/stat` (field 22, counted after the parenthesized comm).
pub fn process_start_identity(pid: u32) -> Option<String> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // comm may contain spaces and parens; fields resume after the last ')'
    let after_comm = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // after_comm starts at field 3 (state); starttime is field 22
    fields.get(19).map(|s| s.to_string())
}

/// Process command line, NUL bytes flattened to spaces.
pub fn process_cmdline(pid: u32) -> Option<String> {
    let raw = std::fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    if raw.is_empty() {
        return None;
    }
    let text: String = raw
        .split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).to_string())
        .collect::<Vec<_>>()
        .join(" ");
    Some(text)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
