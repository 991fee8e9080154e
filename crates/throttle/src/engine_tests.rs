// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::window::ROLLING_WINDOW_MS;
use ralph_config::WeeklyReset;
use ralph_core::FakeClock;
use std::path::Path;

fn profile(data_dir: &Path) -> ProfileConfig {
    ProfileConfig {
        data_dir: data_dir.to_path_buf(),
        provider_id: "anthropic".to_string(),
        budget_5h: 1_000,
        budget_weekly: 10_000,
        soft_pct: 0.8,
        hard_pct: 0.95,
    }
}

fn weekly(now_ms: u64) -> crate::window::WeeklyWindow {
    crate::window::WeeklyWindow {
        start_ms: now_ms.saturating_sub(24 * 3_600_000),
        end_ms: now_ms + 6 * 24 * 3_600_000,
    }
}

fn event(ts_ms: u64, tokens: u64) -> UsageEvent {
    UsageEvent { ts_ms, tokens }
}

const NOW: u64 = 1_800_000_000_000;

#[test]
fn ok_below_soft_cap() {
    let dir = tempfile::tempdir().unwrap();
    let d = decide_from_usage(
        "main",
        &profile(dir.path()),
        &[event(NOW - 1_000, 700)],
        weekly(NOW),
        NOW,
    );
    assert_eq!(d.state, ThrottleState::Ok);
    assert_eq!(d.resume_at_ms, None);
    assert_eq!(d.windows.len(), 2);
    assert_eq!(d.windows[0].used, 700);
    assert_eq!(d.windows[0].soft_cap, 800);
    assert_eq!(d.windows[0].hard_cap, 950);
}

#[test]
fn soft_between_caps() {
    let dir = tempfile::tempdir().unwrap();
    let d = decide_from_usage(
        "main",
        &profile(dir.path()),
        &[event(NOW - 1_000, 850)],
        weekly(NOW),
        NOW,
    );
    assert_eq!(d.state, ThrottleState::Soft);
    // Rolling soft trigger: resume when the event leaves the window
    assert_eq!(d.resume_at_ms, Some(NOW - 1_000 + ROLLING_WINDOW_MS));
}

#[test]
fn hard_on_rolling_cap() {
    let dir = tempfile::tempdir().unwrap();
    let d = decide_from_usage(
        "main",
        &profile(dir.path()),
        &[event(NOW - 2_000, 500), event(NOW - 1_000, 500)],
        weekly(NOW),
        NOW,
    );
    assert_eq!(d.state, ThrottleState::Hard);
    // Dropping the first event brings 1000 below 950
    assert_eq!(d.resume_at_ms, Some(NOW - 2_000 + ROLLING_WINDOW_MS));
}

#[test]
fn weekly_hard_resumes_at_reset() {
    let dir = tempfile::tempdir().unwrap();
    let w = weekly(NOW);
    // Old events beyond the rolling window but within the week
    let events: Vec<UsageEvent> =
        (0..10).map(|i| event(w.start_ms + 1_000 + i, 1_000)).collect();
    let d = decide_from_usage("main", &profile(dir.path()), &events, w, NOW);
    assert_eq!(d.state, ThrottleState::Hard);
    assert_eq!(d.resume_at_ms, Some(w.end_ms), "weekly window resumes at next reset");
    assert_eq!(d.windows[1].used, 10_000);
    assert_eq!(d.windows[1].reset_at_ms, Some(w.end_ms));
}

#[test]
fn resume_is_max_over_windows_at_effective_state() {
    let dir = tempfile::tempdir().unwrap();
    let w = weekly(NOW);
    // Rolling hard (1000 in window) and weekly hard (9500 total ≥ 9500)
    let mut events: Vec<UsageEvent> =
        (0..17).map(|i| event(w.start_ms + 1_000 + i, 500)).collect();
    events.push(event(NOW - 1_000, 1_000));
    let d = decide_from_usage("main", &profile(dir.path()), &events, w, NOW);
    assert_eq!(d.state, ThrottleState::Hard);
    // Weekly reset is far later than any rolling exit
    assert_eq!(d.resume_at_ms, Some(w.end_ms));
}

#[test]
fn engine_caches_until_interval_elapses() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(NOW);

    let mut profiles = std::collections::HashMap::new();
    profiles.insert("main".to_string(), profile(dir.path()));
    let config = ralph_config::ThrottleConfig {
        min_check_interval_ms: 60_000,
        weekly_reset: WeeklyReset::default(),
        auto_profile: Default::default(),
    };
    let engine = ThrottleEngine::new(clock.clone(), config, profiles).unwrap();

    let first = engine.check("main").unwrap();
    assert_eq!(first.state, ThrottleState::Ok);

    // Usage appears on disk, but the cache still answers
    let session = dir.path().join("sessions").join("s1");
    std::fs::create_dir_all(&session).unwrap();
    std::fs::write(
        session.join("msg_1.json"),
        serde_json::to_vec(&serde_json::json!({
            "role": "assistant",
            "provider": "anthropic",
            "ts": NOW,
            "usage": {"input_tokens": 5_000, "output_tokens": 0, "reasoning_tokens": 0},
        }))
        .unwrap(),
    )
    .unwrap();

    clock.advance(std::time::Duration::from_millis(30_000));
    let cached = engine.check("main").unwrap();
    assert_eq!(cached.checked_at_ms, first.checked_at_ms, "within interval: cached");

    clock.advance(std::time::Duration::from_millis(31_000));
    let fresh = engine.check("main").unwrap();
    assert_ne!(fresh.checked_at_ms, first.checked_at_ms);
    assert_eq!(fresh.state, ThrottleState::Hard, "5000 tokens tops the 5h budget");
}

#[test]
fn unknown_profile_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(NOW);
    let mut profiles = std::collections::HashMap::new();
    profiles.insert("main".to_string(), profile(dir.path()));
    let engine =
        ThrottleEngine::new(clock, ralph_config::ThrottleConfig::default(), profiles).unwrap();
    assert!(matches!(engine.check("ghost"), Err(ThrottleError::UnknownProfile(_))));
}

#[test]
fn bad_zone_is_rejected_at_construction() {
    let clock = FakeClock::new();
    let config = ralph_config::ThrottleConfig {
        weekly_reset: WeeklyReset {
            time_zone: "Not/AZone".to_string(),
            ..WeeklyReset::default()
        },
        ..ralph_config::ThrottleConfig::default()
    };
    let result = ThrottleEngine::new(clock, config, std::collections::HashMap::new());
    assert!(matches!(result, Err(ThrottleError::BadZone { .. })));
}
