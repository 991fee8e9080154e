// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Window arithmetic for the throttle engine.
//!
//! The rolling window is trivial; the weekly window is aligned to a
//! configured calendar boundary in an IANA zone, which means DST gaps and
//! ambiguities have to be resolved explicitly.

use crate::scan::UsageEvent;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use ralph_config::WeeklyReset;

/// Rolling window length: 5 hours.
pub const ROLLING_WINDOW_MS: u64 = 5 * 60 * 60 * 1000;

/// `[now − 5h, now]` in epoch milliseconds.
pub fn rolling_window(now_ms: u64) -> (u64, u64) {
    (now_ms.saturating_sub(ROLLING_WINDOW_MS), now_ms)
}

/// The current weekly window `[last_reset, next_reset)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Resolve a local wall-clock time in `tz`, stepping forward through DST
/// gaps. At most three resolution attempts; ambiguous times take the
/// earlier offset.
pub fn resolve_local(
    date: NaiveDate,
    hour: u8,
    minute: u8,
    tz: Tz,
) -> Option<chrono::DateTime<Tz>> {
    let mut naive = date.and_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    for _ in 0..3 {
        match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => return Some(dt),
            chrono::LocalResult::Ambiguous(earlier, _later) => return Some(earlier),
            chrono::LocalResult::None => {
                naive += chrono::Duration::hours(1);
            }
        }
    }
    None
}

/// Compute the weekly window containing `now_ms`.
///
/// Projects now into the zone, walks back to the most recent configured
/// boundary, and projects one week forward for the next one.
pub fn weekly_window(now_ms: u64, reset: &WeeklyReset, tz: Tz) -> Option<WeeklyWindow> {
    let reset_day = reset.day_index()?;
    let now_utc = Utc.timestamp_millis_opt(now_ms as i64).single()?;
    let local_now = now_utc.with_timezone(&tz);

    // Walk back at most 8 days: the matching weekday whose resolved boundary
    // is not in the future.
    let mut candidate = local_now.date_naive();
    for _ in 0..8 {
        if candidate.weekday().num_days_from_monday() == u32::from(reset_day) {
            if let Some(boundary) = resolve_local(candidate, reset.hour, reset.minute, tz) {
                if boundary.timestamp_millis() as u64 <= now_ms {
                    let next_date = candidate + chrono::Duration::days(7);
                    let next = resolve_local(next_date, reset.hour, reset.minute, tz)?;
                    return Some(WeeklyWindow {
                        start_ms: boundary.timestamp_millis() as u64,
                        end_ms: next.timestamp_millis() as u64,
                    });
                }
            }
        }
        candidate -= chrono::Duration::days(1);
    }
    None
}

/// Earliest timestamp at which rolling usage drops below `cap`.
///
/// Each event exits the rolling window 5h after its timestamp; the resume
/// point is the exit time of the last event in the minimal prefix whose
/// removal brings usage under the cap. Returns `None` when usage is
/// already below the cap.
pub fn rolling_resume_at(events: &[UsageEvent], window_start_ms: u64, cap: u64) -> Option<u64> {
    let mut in_window: Vec<&UsageEvent> =
        events.iter().filter(|e| e.ts_ms >= window_start_ms).collect();
    let mut used: u64 = in_window.iter().map(|e| e.tokens).sum();
    if used < cap {
        return None;
    }
    in_window.sort_by_key(|e| e.ts_ms);
    for event in in_window {
        used = used.saturating_sub(event.tokens);
        if used < cap {
            return Some(event.ts_ms + ROLLING_WINDOW_MS);
        }
    }
    // Even dropping everything leaves usage at the cap (cap == 0): resume
    // when the last event leaves the window.
    events.iter().map(|e| e.ts_ms + ROLLING_WINDOW_MS).max()
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
