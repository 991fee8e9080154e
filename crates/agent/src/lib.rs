// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-agent: the agent subprocess supervisor
//!
//! Owns one coding-agent subprocess per task: spawns it, tails its
//! line-delimited JSON stdout into the session events log, enforces
//! watchdog/stall/loop policy, drains operator nudges at safe checkpoints,
//! and terminates the process when policy says so.

mod events_log;
mod loopdetect;
mod nudge;
mod patch;
mod pr_url;
mod protocol;
mod spawner;
mod state;
mod supervisor;

pub use events_log::EventsLog;
pub use loopdetect::{LoopDetector, LoopTripSnapshot};
pub use nudge::{append_nudge, NudgeError, NudgeQueue, NudgeRecord, PendingNudge};
pub use patch::touched_files;
pub use pr_url::PrUrlTracker;
pub use protocol::{AgentEvent, EventKind, ProtocolError, ToolInfo};
pub use spawner::{AgentProcess, SpawnSpec, Spawner, TokioSpawner};
#[cfg(any(test, feature = "test-support"))]
pub use spawner::{FakeProcess, FakeSpawner, ScriptedLine};
pub use state::{MonitorAction, SessionMonitor, TerminationReason};
pub use supervisor::{NudgeDelivery, SessionResult, Supervisor, SupervisorError};
