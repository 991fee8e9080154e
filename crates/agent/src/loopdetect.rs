// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edit-loop detection.
//!
//! An agent that keeps rewriting the same file without ever running a
//! gate command (test, check, commit) is looping. Four thresholds must
//! hold at the same instant to trip; a gate command resets the window.

use ralph_config::LoopConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics frozen at the moment a loop trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopTripSnapshot {
    pub kind: String,
    pub edits_since_gate: u32,
    pub elapsed_ms_without_gate: u64,
    pub top_file: String,
    pub top_file_touches: u32,
    pub top_file_share: f64,
}

/// Stateful loop detector fed by the supervisor.
#[derive(Debug)]
pub struct LoopDetector {
    config: LoopConfig,
    edits_since_gate: u32,
    touches_since_gate: HashMap<String, u32>,
    window_started_ms: Option<u64>,
}

impl LoopDetector {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            edits_since_gate: 0,
            touches_since_gate: HashMap::new(),
            window_started_ms: None,
        }
    }

    /// Whether a bash command counts as a gate.
    pub fn is_gate_command(&self, command: &str) -> bool {
        let command = command.trim();
        self.config.gate_commands.iter().any(|gate| command.starts_with(gate.as_str()))
    }

    /// A gate command ran: reset the edit counter and touch map.
    pub fn on_gate(&mut self) {
        self.edits_since_gate = 0;
        self.touches_since_gate.clear();
        self.window_started_ms = None;
    }

    /// Record one edit touching `files`; returns a snapshot when the loop
    /// trips.
    pub fn on_edit(&mut self, files: &[String], now_ms: u64) -> Option<LoopTripSnapshot> {
        self.edits_since_gate += 1;
        if self.window_started_ms.is_none() {
            self.window_started_ms = Some(now_ms);
        }
        for file in files {
            *self.touches_since_gate.entry(file.clone()).or_insert(0) += 1;
        }
        self.check(now_ms)
    }

    /// Evaluate all four predicates at `now_ms`.
    pub fn check(&self, now_ms: u64) -> Option<LoopTripSnapshot> {
        if self.edits_since_gate < self.config.min_edits {
            return None;
        }
        let window_started = self.window_started_ms?;
        let elapsed = now_ms.saturating_sub(window_started);
        if elapsed < self.config.min_elapsed_ms_without_gate {
            return None;
        }
        let (top_file, top_touches) = self
            .touches_since_gate
            .iter()
            .max_by_key(|(file, touches)| (**touches, std::cmp::Reverse(file.as_str())))
            .map(|(file, touches)| (file.clone(), *touches))?;
        if top_touches < self.config.min_top_file_touches {
            return None;
        }
        let total_touches: u32 = self.touches_since_gate.values().sum();
        let share = if total_touches == 0 {
            0.0
        } else {
            f64::from(top_touches) / f64::from(total_touches)
        };
        if share < self.config.min_top_file_share {
            return None;
        }
        Some(LoopTripSnapshot {
            kind: "loop-trip".to_string(),
            edits_since_gate: self.edits_since_gate,
            elapsed_ms_without_gate: elapsed,
            top_file,
            top_file_touches: top_touches,
            top_file_share: share,
        })
    }
}

#[cfg(test)]
#[path = "loopdetect_tests.rs"]
mod tests;
