// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor's session state machine.
//!
//! Pure and clock-driven: the run loop feeds it events and ticks, it
//! answers with actions. All timing decisions use the supervisor's receive
//! clock, never the agent's own timestamps.

use crate::loopdetect::{LoopDetector, LoopTripSnapshot};
use crate::patch::touched_files;
use crate::pr_url::PrUrlTracker;
use crate::protocol::{AgentEvent, EventKind};
use ralph_config::{LoopConfig, SupervisorConfig};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why the supervisor killed a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    WatchdogTimeout { tool_name: String },
    LoopTrip(LoopTripSnapshot),
    Stall,
}

/// What the run loop should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorAction {
    /// Kill the subprocess (SIGTERM, grace, SIGKILL) and flag the result.
    Terminate(TerminationReason),
    /// A tool crossed its soft watchdog threshold.
    SoftWarn { tool_name: String },
    /// The anomaly burst threshold tripped.
    AnomalyBurst,
    /// A safe checkpoint: drain the nudge queue.
    DeliverNudges,
}

#[derive(Debug)]
struct ActiveTool {
    name: String,
    started_ms: u64,
    soft_ms: u64,
    hard_ms: u64,
    soft_warned: bool,
}

/// Per-session monitor state.
pub struct SessionMonitor {
    supervisor: SupervisorConfig,
    loop_detector: LoopDetector,
    pr_urls: PrUrlTracker,
    current_tool: Option<ActiveTool>,
    last_activity_ms: u64,
    anomaly_times: VecDeque<u64>,
    anomalies_total: u32,
    burst_emitted: bool,
}

impl SessionMonitor {
    pub fn new(supervisor: SupervisorConfig, loop_config: LoopConfig, started_ms: u64) -> Self {
        Self {
            supervisor,
            loop_detector: LoopDetector::new(loop_config),
            pr_urls: PrUrlTracker::new(),
            current_tool: None,
            last_activity_ms: started_ms,
            anomaly_times: VecDeque::new(),
            anomalies_total: 0,
            burst_emitted: false,
        }
    }

    /// Feed one validated protocol event received at `now_ms`.
    pub fn on_event(&mut self, event: &AgentEvent, now_ms: u64) -> Vec<MonitorAction> {
        self.last_activity_ms = now_ms;
        let mut actions = Vec::new();
        match event.kind {
            EventKind::ToolStart => {
                let name = event.tool_name().unwrap_or("unknown").to_string();
                let durations = self.supervisor.watchdog_for(&name);
                self.current_tool = Some(ActiveTool {
                    name,
                    started_ms: now_ms,
                    soft_ms: durations.soft_ms,
                    hard_ms: durations.hard_ms,
                    soft_warned: false,
                });
                if let Some(command) = event.bash_command() {
                    if self.loop_detector.is_gate_command(command) {
                        self.loop_detector.on_gate();
                    }
                }
                if let Some(patch) = event.patch_text() {
                    let files = touched_files(patch);
                    if let Some(trip) = self.loop_detector.on_edit(&files, now_ms) {
                        actions.push(MonitorAction::Terminate(TerminationReason::LoopTrip(trip)));
                    }
                }
            }
            EventKind::ToolEnd => {
                self.current_tool = None;
                actions.push(MonitorAction::DeliverNudges);
            }
            EventKind::Message => {
                if let Some(text) = &event.text {
                    self.pr_urls.record_text(text);
                }
                actions.push(MonitorAction::DeliverNudges);
            }
            EventKind::Session => {
                if let Some(url) = &event.pr_url {
                    self.pr_urls.record_structured(url);
                }
            }
            EventKind::Anomaly => {
                self.anomalies_total += 1;
                self.anomaly_times.push_back(now_ms);
                let window_start =
                    now_ms.saturating_sub(self.supervisor.anomaly_burst_window_ms);
                while self.anomaly_times.front().is_some_and(|t| *t < window_start) {
                    self.anomaly_times.pop_front();
                }
                let burst = self.anomaly_times.len() as u32
                    >= self.supervisor.anomaly_burst_count
                    || self.anomalies_total >= self.supervisor.anomaly_cumulative_limit;
                if burst && !self.burst_emitted {
                    self.burst_emitted = true;
                    actions.push(MonitorAction::AnomalyBurst);
                }
            }
            EventKind::RunStart | EventKind::StepStart => {}
        }
        actions
    }

    /// Periodic timer check at `now_ms`.
    pub fn on_tick(&mut self, now_ms: u64) -> Vec<MonitorAction> {
        let mut actions = Vec::new();
        if let Some(tool) = &mut self.current_tool {
            let running_ms = now_ms.saturating_sub(tool.started_ms);
            if running_ms >= tool.hard_ms {
                let name = tool.name.clone();
                self.current_tool = None;
                actions.push(MonitorAction::Terminate(TerminationReason::WatchdogTimeout {
                    tool_name: name,
                }));
                return actions;
            }
            if running_ms >= tool.soft_ms && !tool.soft_warned {
                tool.soft_warned = true;
                actions.push(MonitorAction::SoftWarn { tool_name: tool.name.clone() });
            }
        }
        if now_ms.saturating_sub(self.last_activity_ms) >= self.supervisor.stall_timeout_ms {
            actions.push(MonitorAction::Terminate(TerminationReason::Stall));
        }
        actions
    }

    /// Best PR URL candidate seen so far.
    pub fn best_pr_url(&self, repo: &str) -> Option<String> {
        self.pr_urls.best(repo)
    }

    /// Cumulative anomaly count (diagnostics).
    pub fn anomalies_total(&self) -> u32 {
        self.anomalies_total
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
