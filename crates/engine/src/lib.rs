// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-engine: workers, gates, scheduling, autopilot
//!
//! The per-repository worker drives each task through the gate sequence
//! and writes outcomes back to the hosting service; the scheduler decides
//! which repository gets the next tick; the escalation autopilot resolves
//! the narrow class of escalations that never need a human.

mod alerts;
mod audit;
mod autopilot;
mod ci;
mod error;
mod markers;
mod merge;
mod recovery;
mod scheduler;
mod worker;
mod worktree;

pub use alerts::{alert_marker, alert_marker_id, write_alert, AlertOutcome};
pub use audit::{audit_queue_parity, DriftReport};
pub use autopilot::{
    autopilot_tick, parse_consultant_decision, Autopilot, AutopilotOutcome, ConsultantDecision,
    DecisionParse,
};
pub use ci::{classify_ci_failure, CiTriagePayload, CLASSIFIER_VERSION};
pub use error::EngineError;
pub use markers::{
    parse_product_gap, parse_routing_decision, render_routing_decision, GapMarker, RoutingDecision,
    RoutingParse, RoutingVerdict,
};
pub use merge::{merge_task_pr, MergeOutcome};
pub use recovery::{try_ensure_pr_from_worktree, RecoveryOutcome, TerminalRun};
pub use scheduler::{DispatchGate, PriorityScheduler, SchedulerTick};
pub use worker::{AgentRunner, RepoWorker, ReviewOutcome, TickOutcome, WorkerDeps};
pub use worktree::{FakeGit, GitOps, RealGit, WorktreeError};
