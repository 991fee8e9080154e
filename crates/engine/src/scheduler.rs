// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-banded round-robin dispatch.
//!
//! One policy cycle hands a band-`p` repo `p + 1` turns. Higher bands run
//! first, round-robin within a band, and every repo appears at least once
//! per cycle, so nothing starves. The turn queue rebuilds whenever the
//! priority mapping changes.

use ralph_core::PriorityBand;
use ralph_throttle::ThrottleState;
use std::collections::{HashMap, VecDeque};

/// Whether new work may be dispatched at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchGate {
    Ready,
    Paused,
    Draining,
    HardThrottle,
}

impl DispatchGate {
    /// Combine daemon mode and throttle state into the dispatch verdict.
    pub fn evaluate(mode: &str, throttle: ThrottleState) -> Self {
        match mode {
            "paused" => DispatchGate::Paused,
            "draining" => DispatchGate::Draining,
            _ if throttle == ThrottleState::Hard => DispatchGate::HardThrottle,
            _ => DispatchGate::Ready,
        }
    }

    pub fn allows_new_work(&self) -> bool {
        matches!(self, DispatchGate::Ready)
    }
}

/// One scheduler decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerTick {
    /// Dispatch a task for this repo.
    Dispatch { repo: String },
    /// Nothing eligible right now.
    Idle,
}

/// Priority-banded round-robin scheduler with per-repo concurrency slots.
pub struct PriorityScheduler {
    /// (repo, band, slots) in configuration order.
    repos: Vec<(String, PriorityBand, u32)>,
    /// Remaining turns in the current policy cycle.
    cycle: VecDeque<String>,
    active: HashMap<String, u32>,
}

impl PriorityScheduler {
    pub fn new() -> Self {
        Self { repos: Vec::new(), cycle: VecDeque::new(), active: HashMap::new() }
    }

    /// Install (or update) the repo set. A changed priority mapping resets
    /// the cycle state.
    pub fn set_repos(&mut self, repos: Vec<(String, PriorityBand, u32)>) {
        if repos != self.repos {
            self.repos = repos;
            self.cycle.clear();
            self.active.retain(|repo, _| self.repos.iter().any(|(r, _, _)| r == repo));
        }
    }

    /// Build one policy cycle: bands high to low; within a band, repos
    /// round-robin until their `p + 1` turns are spent.
    fn rebuild_cycle(&mut self) {
        self.cycle.clear();
        for band in (0..=PriorityBand::MAX).rev() {
            let members: Vec<&String> = self
                .repos
                .iter()
                .filter(|(_, b, _)| b.0 == band)
                .map(|(repo, _, _)| repo)
                .collect();
            if members.is_empty() {
                continue;
            }
            let turns = PriorityBand(band).turns();
            for _ in 0..turns {
                for repo in &members {
                    self.cycle.push_back((*repo).clone());
                }
            }
        }
    }

    /// Select the next repo whose `eligible` predicate passes and which
    /// has a free concurrency slot. Consumes that repo's turn; ineligible
    /// repos keep their turns for later in the cycle.
    pub fn next(&mut self, eligible: &dyn Fn(&str) -> bool) -> SchedulerTick {
        if self.repos.is_empty() {
            return SchedulerTick::Idle;
        }
        if self.cycle.is_empty() {
            self.rebuild_cycle();
        }
        for index in 0..self.cycle.len() {
            let repo = &self.cycle[index];
            if !eligible(repo) {
                continue;
            }
            if !self.has_free_slot(repo) {
                continue;
            }
            let repo = self
                .cycle
                .remove(index)
                .unwrap_or_default();
            return SchedulerTick::Dispatch { repo };
        }
        SchedulerTick::Idle
    }

    fn slots_for(&self, repo: &str) -> u32 {
        self.repos
            .iter()
            .find(|(r, _, _)| r == repo)
            .map(|(_, _, slots)| *slots)
            .unwrap_or(1)
    }

    fn has_free_slot(&self, repo: &str) -> bool {
        self.active.get(repo).copied().unwrap_or(0) < self.slots_for(repo)
    }

    /// Mark a task started for a repo. Returns false when the repo is at
    /// its slot cap.
    pub fn acquire_slot(&mut self, repo: &str) -> bool {
        if !self.has_free_slot(repo) {
            return false;
        }
        *self.active.entry(repo.to_string()).or_insert(0) += 1;
        true
    }

    /// Mark a task finished for a repo.
    pub fn release_slot(&mut self, repo: &str) {
        if let Some(count) = self.active.get_mut(repo) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn active_count(&self, repo: &str) -> u32 {
        self.active.get(repo).copied().unwrap_or(0)
    }
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
