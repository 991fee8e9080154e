// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon registry record.
//!
//! One JSON file at the canonical registry path describes the live daemon:
//! who it is, where it runs, and when it last heartbeat. Written
//! atomically so CLI readers never see a torn record.

use ralph_core::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The registry record at `<control-root>/daemon-registry.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRecord {
    pub version: u32,
    pub daemon_id: String,
    pub pid: u32,
    pub started_at: String,
    pub heartbeat_at: String,
    pub control_root: PathBuf,
    pub control_file_path: PathBuf,
    pub cwd: PathBuf,
    pub command: String,
    pub ralph_version: String,
}

impl DaemonRecord {
    /// Build a fresh record for this process.
    pub fn for_current_process(
        daemon_id: &str,
        started_at: &str,
        control_root: &Path,
        control_file_path: &Path,
    ) -> Self {
        let command = std::env::args().collect::<Vec<_>>().join(" ");
        Self {
            version: 1,
            daemon_id: daemon_id.to_string(),
            pid: std::process::id(),
            started_at: started_at.to_string(),
            heartbeat_at: started_at.to_string(),
            control_root: control_root.to_path_buf(),
            control_file_path: control_file_path.to_path_buf(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            command,
            ralph_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_atomic(path, &bytes)
    }

    pub fn read(path: &Path) -> std::io::Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let record = serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(record))
    }

    /// Refresh the heartbeat timestamp in place.
    pub fn heartbeat(&mut self, path: &Path, now: &str) -> std::io::Result<()> {
        self.heartbeat_at = now.to_string();
        self.write(path)
    }

    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
