// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-file watcher.
//!
//! A small JSON file steers the daemon without a restart: mode, pause
//! flags, profile override. The watcher re-reads it on a ~1s poll and
//! immediately on SIGUSR1; changes surface at the next dispatcher tick
//! through a watch channel. A malformed file keeps the previous state.

use ralph_core::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Daemon operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonMode {
    #[default]
    Running,
    Draining,
    Paused,
}

impl DaemonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonMode::Running => "running",
            DaemonMode::Draining => "draining",
            DaemonMode::Paused => "paused",
        }
    }
}

/// The control file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub mode: DaemonMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_requested: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_at_checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
}

fn default_version() -> u32 {
    1
}

impl Default for ControlFile {
    fn default() -> Self {
        Self {
            version: 1,
            mode: DaemonMode::Running,
            pause_requested: None,
            pause_at_checkpoint: None,
            drain_timeout_ms: None,
            default_profile: None,
        }
    }
}

impl ControlFile {
    /// Read the control file. Missing file → defaults; unreadable or
    /// malformed → `None` (caller keeps its previous state).
    pub fn load(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed control file");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(Self::default()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable control file");
                None
            }
        }
    }

    /// Write the file atomically (CLI `resume`, tests).
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_atomic(path, &bytes)
    }

    /// Effective drain timeout.
    pub fn drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.drain_timeout_ms.unwrap_or(30_000))
    }
}

/// Spawn the watcher task. The returned receiver always holds the latest
/// good control state.
pub fn spawn_control_watcher(
    path: PathBuf,
    poll_interval: std::time::Duration,
) -> (watch::Receiver<ControlFile>, tokio::task::JoinHandle<()>) {
    let initial = ControlFile::load(&path).unwrap_or_default();
    let (tx, rx) = watch::channel(initial);
    let handle = tokio::spawn(async move {
        let mut sigusr1 = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::user_defined1(),
        ) {
            Ok(signal) => Some(signal),
            Err(e) => {
                tracing::warn!(error = %e, "SIGUSR1 handler unavailable; polling only");
                None
            }
        };
        loop {
            match &mut sigusr1 {
                Some(signal) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = signal.recv() => {
                            tracing::debug!("control reload signal received");
                        }
                    }
                }
                None => tokio::time::sleep(poll_interval).await,
            }
            let Some(latest) = ControlFile::load(&path) else { continue };
            let changed = *tx.borrow() != latest;
            if changed {
                tracing::info!(mode = latest.mode.as_str(), "control file changed");
                if tx.send(latest).is_err() {
                    return;
                }
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
