// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-root path derivation.
//!
//! Everything the daemon persists lives under one control root
//! (default `<home>/.ralph/control`). Derivation is pure so tests can
//! resolve against a tempdir; reading the environment is the daemon's job.

use std::io;
use std::path::{Path, PathBuf};

/// Canonical locations derived from the control root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPaths {
    /// Root state directory (e.g. `~/.ralph/control`)
    pub control_root: PathBuf,
    /// Daemon registry record (`daemon-registry.json`)
    pub daemon_registry: PathBuf,
    /// Startup lock directory (`daemon.lock/`)
    pub lock_dir: PathBuf,
    /// Unix socket for CLI queries
    pub socket_path: PathBuf,
    /// Daemon log file
    pub daemon_log: PathBuf,
    /// Durable SQLite store
    pub db_path: PathBuf,
    /// Per-session artifact directories
    pub sessions_dir: PathBuf,
    /// Task record files
    pub queue_dir: PathBuf,
    /// TOML configuration file
    pub config_path: PathBuf,
    /// Control file candidates, most-preferred first
    control_file_candidates: Vec<PathBuf>,
}

impl ControlPaths {
    /// Derive all paths from the home directory and environment facts.
    ///
    /// `root_override` wins over the default `<home>/.ralph/control`.
    /// The control-file search order is fixed: canonical root, then
    /// `$XDG_STATE_HOME/ralph`, then `<home>/.local/state/ralph`, then
    /// `/tmp/ralph/<uid>`.
    pub fn resolve(
        home: &Path,
        xdg_state_home: Option<&Path>,
        uid: u32,
        root_override: Option<&Path>,
    ) -> Self {
        let control_root = root_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home.join(".ralph").join("control"));

        let mut control_file_candidates = vec![control_root.join("control.json")];
        if let Some(xdg) = xdg_state_home {
            control_file_candidates.push(xdg.join("ralph").join("control.json"));
        }
        control_file_candidates.push(home.join(".local/state/ralph/control.json"));
        control_file_candidates.push(PathBuf::from(format!("/tmp/ralph/{}/control.json", uid)));

        Self {
            daemon_registry: control_root.join("daemon-registry.json"),
            lock_dir: control_root.join("daemon.lock"),
            socket_path: control_root.join("daemon.sock"),
            daemon_log: control_root.join("daemon.log"),
            db_path: control_root.join("state.db"),
            sessions_dir: control_root.join("sessions"),
            queue_dir: control_root.join("queue"),
            config_path: control_root.join("config.toml"),
            control_file_candidates,
            control_root,
        }
    }

    /// The canonical control-file path (where writers write).
    pub fn canonical_control_file(&self) -> &Path {
        &self.control_file_candidates[0]
    }

    /// The control file a reader should use: the first candidate that
    /// exists, else the canonical location.
    pub fn control_file(&self) -> PathBuf {
        for candidate in &self.control_file_candidates {
            if candidate.exists() {
                return candidate.clone();
            }
        }
        self.control_file_candidates[0].clone()
    }

    /// All control-file candidates in search order.
    pub fn control_file_candidates(&self) -> &[PathBuf] {
        &self.control_file_candidates
    }
}

/// Write a file atomically: write to a temp sibling, then rename.
///
/// Readers interleaving with this writer observe either the old content or
/// the new content, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(".{}.tmp.{}", name.to_string_lossy(), std::process::id()));
    std::fs::write(&tmp, contents)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
