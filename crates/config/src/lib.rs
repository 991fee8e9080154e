// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-config: TOML configuration for the orchestrator
//!
//! One file under the control root describes the repositories to work,
//! the agent profiles with their token budgets, and the supervision
//! thresholds. Everything has a default; an empty file is a valid config.

mod types;

pub use types::{
    AutoProfileConfig, AutopilotConfig, Config, ConfigError, LoopConfig, ProfileConfig,
    RepoConfig, SupervisorConfig, ThrottleConfig, WatchdogDurations, WeeklyReset,
};
