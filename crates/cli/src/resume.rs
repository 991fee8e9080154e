// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `resume` command: clear pause state and return the daemon to
//! `running`.
//!
//! The control file is the source of truth, so the rewrite works whether
//! or not a daemon is alive; a live daemon is additionally signalled
//! (SIGUSR1) so it reloads immediately instead of at the next poll.

use crate::client::{ClientError, DaemonClient};
use ralph_core::ControlPaths;
use ralph_daemon::{ControlFile, DaemonMode, DaemonRecord};

pub async fn handle(paths: &ControlPaths) -> anyhow::Result<()> {
    let control_path = paths.control_file();
    let mut control = ControlFile::load(&control_path).unwrap_or_default();
    control.mode = DaemonMode::Running;
    control.pause_requested = None;
    control.pause_at_checkpoint = None;
    control.write(&control_path)?;

    // Prefer the IPC path; fall back to SIGUSR1 when the socket is gone
    // but a recorded PID still answers.
    let client = DaemonClient::new(&paths.socket_path);
    match client.resume().await {
        Ok(()) => {
            println!("resumed");
            return Ok(());
        }
        Err(ClientError::DaemonNotRunning) => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(record) = DaemonRecord::read(&paths.daemon_registry).ok().flatten() {
        if signal_reload(record.pid) {
            println!("resumed (signalled pid {})", record.pid);
            return Ok(());
        }
    }
    println!("resumed (daemon not running; takes effect on next start)");
    Ok(())
}

fn signal_reload(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else { return false };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGUSR1)
        .is_ok()
}
