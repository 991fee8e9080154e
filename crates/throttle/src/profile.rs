// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-profile selection.
//!
//! Prefer-sooner-reset: among profiles whose weekly window is not hard and
//! which still have a usable remainder, pick the one whose weekly window
//! resets soonest. A minimum switch interval stops the selector from
//! flapping between near-equal profiles.

use crate::engine::{ThrottleDecision, ThrottleState};
use ralph_config::AutoProfileConfig;

/// One profile's facts relevant to selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCandidate {
    pub name: String,
    pub decision: ThrottleDecision,
}

impl ProfileCandidate {
    fn weekly(&self) -> Option<&crate::engine::WindowSnapshot> {
        self.decision.windows.iter().find(|w| w.window == "weekly")
    }

    /// Fraction of the weekly hard cap still unspent.
    fn remaining_fraction(&self) -> f64 {
        match self.weekly() {
            Some(w) if w.hard_cap > 0 => {
                1.0 - (w.used.min(w.hard_cap) as f64 / w.hard_cap as f64)
            }
            _ => 0.0,
        }
    }

    fn weekly_reset_ms(&self) -> u64 {
        self.weekly().and_then(|w| w.reset_at_ms).unwrap_or(u64::MAX)
    }

    fn weekly_is_hard(&self) -> bool {
        matches!(self.weekly(), Some(w) if w.used >= w.hard_cap)
    }
}

/// Sticky auto-profile selector.
#[derive(Debug, Default)]
pub struct AutoProfileSelector {
    current: Option<String>,
    last_switch_ms: Option<u64>,
}

impl AutoProfileSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Pick the profile to use now. Returns the selection (also remembered
    /// as current).
    pub fn select(
        &mut self,
        candidates: &[ProfileCandidate],
        now_ms: u64,
        config: &AutoProfileConfig,
    ) -> Option<String> {
        let mut eligible: Vec<&ProfileCandidate> = candidates
            .iter()
            .filter(|c| !c.weekly_is_hard())
            .filter(|c| c.remaining_fraction() >= config.min_remaining_fraction)
            .collect();
        eligible.sort_by_key(|c| (c.weekly_reset_ms(), c.name.clone()));
        let best = eligible.first().map(|c| c.name.clone());

        let Some(best) = best else {
            // Nothing eligible: stick with whatever we had.
            return self.current.clone();
        };

        let current_still_eligible = self
            .current
            .as_ref()
            .is_some_and(|cur| eligible.iter().any(|c| &c.name == cur));

        if let Some(current) = &self.current {
            if *current == best {
                return Some(best);
            }
            // Suppress flapping: keep an eligible current until the switch
            // interval has elapsed. An ineligible current is abandoned
            // immediately.
            if current_still_eligible {
                let since_switch =
                    now_ms.saturating_sub(self.last_switch_ms.unwrap_or(0));
                if since_switch < config.min_switch_interval_ms {
                    return Some(current.clone());
                }
            }
        }

        self.current = Some(best.clone());
        self.last_switch_ms = Some(now_ms);
        Some(best)
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
