// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_config::LoopConfig;

fn config() -> LoopConfig {
    LoopConfig {
        min_edits: 2,
        min_elapsed_ms_without_gate: 1_000,
        min_top_file_touches: 2,
        min_top_file_share: 0.5,
        gate_commands: vec!["cargo test".to_string(), "git commit".to_string()],
    }
}

fn one(file: &str) -> Vec<String> {
    vec![file.to_string()]
}

#[test]
fn trips_when_all_four_predicates_hold() {
    let mut detector = LoopDetector::new(config());
    assert!(detector.on_edit(&one("src/main.rs"), 0).is_none());
    // 1100 ms later, same file, no gate in between
    let trip = detector.on_edit(&one("src/main.rs"), 1_100).unwrap();
    assert_eq!(trip.kind, "loop-trip");
    assert_eq!(trip.edits_since_gate, 2);
    assert_eq!(trip.elapsed_ms_without_gate, 1_100);
    assert_eq!(trip.top_file, "src/main.rs");
    assert_eq!(trip.top_file_touches, 2);
    assert_eq!(trip.top_file_share, 1.0);
}

#[test]
fn no_trip_before_elapsed_threshold() {
    let mut detector = LoopDetector::new(config());
    assert!(detector.on_edit(&one("a.rs"), 0).is_none());
    assert!(detector.on_edit(&one("a.rs"), 500).is_none(), "only 500ms elapsed");
    // But the same state trips once enough time passes
    assert!(detector.check(1_000).is_some());
}

#[test]
fn no_trip_below_edit_count() {
    let mut detector = LoopDetector::new(config());
    assert!(detector.on_edit(&one("a.rs"), 0).is_none());
    assert!(detector.check(5_000).is_none(), "one edit is not a loop");
}

#[test]
fn no_trip_when_touches_spread_across_files() {
    let mut detector = LoopDetector::new(config());
    detector.on_edit(&one("a.rs"), 0);
    detector.on_edit(&one("b.rs"), 100);
    detector.on_edit(&one("c.rs"), 200);
    detector.on_edit(&one("d.rs"), 300);
    // 4 edits, enough time, but top share is 1/4 < 0.5
    assert!(detector.check(10_000).is_none());
}

#[test]
fn gate_resets_the_window() {
    let mut detector = LoopDetector::new(config());
    detector.on_edit(&one("a.rs"), 0);
    detector.on_gate();
    assert!(detector.on_edit(&one("a.rs"), 1_100).is_none(), "counter restarted at the gate");
    // Elapsed is measured from the first post-gate edit
    assert!(detector.check(1_100 + 999).is_none());
    assert!(detector.check(1_100 + 1_000).is_some());
}

#[yare::parameterized(
    exact = { "cargo test", true },
    with_args = { "cargo test --workspace", true },
    commit = { "git commit -m x", true },
    leading_space = { "  cargo test", true },
    other = { "cargo build", false },
    substring_not_prefix = { "echo cargo test", false },
)]
fn gate_command_allowlist(command: &str, is_gate: bool) {
    let detector = LoopDetector::new(config());
    assert_eq!(detector.is_gate_command(command), is_gate);
}

#[test]
fn multi_file_edit_counts_each_touch() {
    let mut detector = LoopDetector::new(config());
    detector.on_edit(&["a.rs".to_string(), "b.rs".to_string()], 0);
    let trip = detector.on_edit(&["a.rs".to_string()], 1_200).unwrap();
    assert_eq!(trip.top_file, "a.rs");
    assert_eq!(trip.top_file_touches, 2);
    assert!((trip.top_file_share - 2.0 / 3.0).abs() < 1e-9);
}
