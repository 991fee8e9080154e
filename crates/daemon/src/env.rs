// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment resolution for the daemon and CLI.
//!
//! The only place that reads process environment; everything downstream
//! takes a resolved [`ControlPaths`].

use ralph_core::ControlPaths;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("could not determine the home directory")]
    NoHome,
}

/// Resolve control paths from the process environment.
///
/// `RALPH_CONTROL_ROOT` overrides the root entirely (tests, multi-user
/// hosts); `XDG_STATE_HOME` influences the control-file search order.
pub fn control_paths() -> Result<ControlPaths, EnvError> {
    let home = dirs::home_dir().ok_or(EnvError::NoHome)?;
    let xdg_state = std::env::var_os("XDG_STATE_HOME").map(PathBuf::from);
    let root_override = std::env::var_os("RALPH_CONTROL_ROOT").map(PathBuf::from);
    let uid = nix::unistd::getuid().as_raw();
    Ok(ControlPaths::resolve(
        &home,
        xdg_state.as_deref(),
        uid,
        root_override.as_deref(),
    ))
}

/// Path to the config file, honoring `RALPH_CONFIG`.
pub fn config_path(paths: &ControlPaths) -> PathBuf {
    std::env::var_os("RALPH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.config_path.clone())
}
