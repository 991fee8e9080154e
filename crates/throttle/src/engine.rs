// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Throttle decision computation and caching.

use crate::scan::{scan_profile_usage, UsageEvent};
use crate::window::{rolling_resume_at, rolling_window, weekly_window, WeeklyWindow};
use chrono_tz::Tz;
use parking_lot::Mutex;
use ralph_config::{ProfileConfig, ThrottleConfig};
use ralph_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Throttle errors
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("invalid time zone {zone:?}")]
    BadZone { zone: String },

    #[error("could not derive the weekly window")]
    WindowUnresolved,
}

/// May new work start?
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleState {
    Ok,
    Soft,
    Hard,
}

impl fmt::Display for ThrottleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThrottleState::Ok => "ok",
            ThrottleState::Soft => "soft",
            ThrottleState::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

/// Per-window usage snapshot carried on a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// "5h" or "weekly"
    pub window: String,
    pub used: u64,
    pub soft_cap: u64,
    pub hard_cap: u64,
    /// When this window resets (weekly) or `None` for the rolling window.
    pub reset_at_ms: Option<u64>,
}

impl WindowSnapshot {
    fn state(&self) -> ThrottleState {
        if self.used >= self.hard_cap {
            ThrottleState::Hard
        } else if self.used >= self.soft_cap {
            ThrottleState::Soft
        } else {
            ThrottleState::Ok
        }
    }
}

/// The throttle verdict for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDecision {
    pub profile: String,
    pub state: ThrottleState,
    /// When work may resume; `None` when state is ok.
    pub resume_at_ms: Option<u64>,
    pub windows: Vec<WindowSnapshot>,
    pub checked_at_ms: u64,
}

/// Pure decision computation from usage events; the engine wraps this with
/// scanning and caching.
pub fn decide_from_usage(
    profile_name: &str,
    profile: &ProfileConfig,
    events: &[UsageEvent],
    weekly: WeeklyWindow,
    now_ms: u64,
) -> ThrottleDecision {
    let (rolling_start, _) = rolling_window(now_ms);

    let rolling_used: u64 =
        events.iter().filter(|e| e.ts_ms >= rolling_start && e.ts_ms <= now_ms).map(|e| e.tokens).sum();
    let weekly_used: u64 = events
        .iter()
        .filter(|e| e.ts_ms >= weekly.start_ms && e.ts_ms < weekly.end_ms)
        .map(|e| e.tokens)
        .sum();

    let caps = |budget: u64| -> (u64, u64) {
        (
            (budget as f64 * profile.soft_pct).floor() as u64,
            (budget as f64 * profile.hard_pct).floor() as u64,
        )
    };
    let (rolling_soft, rolling_hard) = caps(profile.budget_5h);
    let (weekly_soft, weekly_hard) = caps(profile.budget_weekly);

    let rolling_snapshot = WindowSnapshot {
        window: "5h".to_string(),
        used: rolling_used,
        soft_cap: rolling_soft,
        hard_cap: rolling_hard,
        reset_at_ms: None,
    };
    let weekly_snapshot = WindowSnapshot {
        window: "weekly".to_string(),
        used: weekly_used,
        soft_cap: weekly_soft,
        hard_cap: weekly_hard,
        reset_at_ms: Some(weekly.end_ms),
    };

    let state = rolling_snapshot.state().max(weekly_snapshot.state());

    // resume_at: the max over windows that triggered the effective state.
    let resume_at_ms = if state == ThrottleState::Ok {
        None
    } else {
        let mut resume: Option<u64> = None;
        for snapshot in [&rolling_snapshot, &weekly_snapshot] {
            if snapshot.state() != state {
                continue;
            }
            let cap = match state {
                ThrottleState::Hard => snapshot.hard_cap,
                _ => snapshot.soft_cap,
            };
            let candidate = match snapshot.window.as_str() {
                "weekly" => Some(weekly.end_ms),
                _ => rolling_resume_at(events, rolling_start, cap),
            };
            if let Some(candidate) = candidate {
                resume = Some(resume.map_or(candidate, |r: u64| r.max(candidate)));
            }
        }
        resume
    };

    ThrottleDecision {
        profile: profile_name.to_string(),
        state,
        resume_at_ms,
        windows: vec![rolling_snapshot, weekly_snapshot],
        checked_at_ms: now_ms,
    }
}

/// Scanning, caching throttle engine.
///
/// The zone is resolved once at construction (process start) and never
/// re-resolved, even if the system zone changes underneath us.
pub struct ThrottleEngine<C: Clock> {
    clock: C,
    config: ThrottleConfig,
    profiles: HashMap<String, ProfileConfig>,
    tz: Tz,
    cache: Mutex<HashMap<String, ThrottleDecision>>,
}

impl<C: Clock> ThrottleEngine<C> {
    pub fn new(
        clock: C,
        config: ThrottleConfig,
        profiles: HashMap<String, ProfileConfig>,
    ) -> Result<Self, ThrottleError> {
        let zone = &config.weekly_reset.time_zone;
        let tz = if zone.is_empty() {
            // Zone fixed at process start; fall back to UTC when the system
            // zone cannot be named.
            std::env::var("TZ")
                .ok()
                .and_then(|name| Tz::from_str(&name).ok())
                .unwrap_or(chrono_tz::UTC)
        } else {
            Tz::from_str(zone).map_err(|_| ThrottleError::BadZone { zone: zone.clone() })?
        };
        Ok(Self { clock, config, profiles, tz, cache: Mutex::new(HashMap::new()) })
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// The throttle decision for a profile, re-scanning at most once per
    /// `min_check_interval_ms`.
    pub fn check(&self, profile_name: &str) -> Result<ThrottleDecision, ThrottleError> {
        let now_ms = self.clock.epoch_ms();
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.get(profile_name) {
                if now_ms.saturating_sub(cached.checked_at_ms) < self.config.min_check_interval_ms
                {
                    return Ok(cached.clone());
                }
            }
        }
        let decision = self.check_fresh(profile_name, now_ms)?;
        self.cache.lock().insert(profile_name.to_string(), decision.clone());
        Ok(decision)
    }

    /// Recompute ignoring the cache (CLI `status --refresh`, tests).
    pub fn check_fresh(
        &self,
        profile_name: &str,
        now_ms: u64,
    ) -> Result<ThrottleDecision, ThrottleError> {
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| ThrottleError::UnknownProfile(profile_name.to_string()))?;
        let weekly = weekly_window(now_ms, &self.config.weekly_reset, self.tz)
            .ok_or(ThrottleError::WindowUnresolved)?;
        let scan_floor = weekly.start_ms.min(rolling_window(now_ms).0);
        let events = scan_profile_usage(&profile.data_dir, &profile.provider_id, scan_floor);
        let decision = decide_from_usage(profile_name, profile, &events, weekly, now_ms);
        tracing::debug!(
            profile = profile_name,
            state = %decision.state,
            "throttle decision computed"
        );
        Ok(decision)
    }

    /// Decisions for every configured profile (status output).
    pub fn snapshot_all(&self) -> Vec<ThrottleDecision> {
        let mut names: Vec<&String> = self.profiles.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.check(name).ok())
            .collect()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
