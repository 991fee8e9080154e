// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    gap = { "PRODUCT GAP: missing retry UI", Some(true) },
    no_gap = { "NO PRODUCT GAP: covered by settings", Some(false) },
    absent = { "looks fine to me", None },
    midline_is_ignored = { "I think PRODUCT GAP: maybe", None },
    indented_counts = { "  PRODUCT GAP: indented", Some(true) },
    fuzzy_phrase_ignored = { "there is a product gap here", None },
)]
fn gap_marker_cases(text: &str, expected: Option<bool>) {
    assert_eq!(parse_product_gap(text).has_gap(), expected);
}

#[test]
fn last_gap_marker_wins() {
    let text = "PRODUCT GAP: first pass\n...details...\nNO PRODUCT GAP: resolved after discussion";
    assert_eq!(parse_product_gap(text), GapMarker::NoGap);
}

#[test]
fn decision_block_parses() {
    let text = "Review notes.\n\n## Decision\n\n```json\n{\"verdict\": \"approve\", \"reasons\": [\"small diff\"]}\n```\n";
    match parse_routing_decision(text) {
        RoutingParse::Found(decision) => {
            assert_eq!(decision.verdict, RoutingVerdict::Approve);
            assert_eq!(decision.reasons, ["small diff"]);
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn sentinel_parses_when_no_block() {
    let text = "Looked at everything.\n\nDECISION: revise\n";
    assert_eq!(
        parse_routing_decision(text),
        RoutingParse::Found(RoutingDecision { verdict: RoutingVerdict::Revise, reasons: vec![] })
    );
}

#[test]
fn sentinel_must_be_final_line() {
    let text = "DECISION: approve\nbut then more prose";
    assert_eq!(parse_routing_decision(text), RoutingParse::NotFound);
}

#[test]
fn absence_is_not_malformation() {
    assert_eq!(parse_routing_decision("no decision anywhere"), RoutingParse::NotFound);
    assert_eq!(parse_routing_decision(""), RoutingParse::NotFound);
}

#[yare::parameterized(
    bad_json = { "## Decision\n```json\n{nope}\n```" },
    unterminated = { "## Decision\n```json\n{\"verdict\":\"approve\"}" },
    no_fence = { "## Decision\njust prose" },
    heading_then_eof = { "## Decision" },
    bad_sentinel_word = { "DECISION: maybe" },
)]
fn malformed_is_distinct(text: &str) {
    assert!(
        matches!(parse_routing_decision(text), RoutingParse::Malformed(_)),
        "{text:?} must be malformed"
    );
}

#[yare::parameterized(
    approve = { RoutingVerdict::Approve },
    revise = { RoutingVerdict::Revise },
    reject = { RoutingVerdict::Reject },
)]
fn render_parse_roundtrip(verdict: RoutingVerdict) {
    let decision = RoutingDecision {
        verdict,
        reasons: vec!["one".to_string(), "two".to_string()],
    };
    let rendered = render_routing_decision(&decision);
    assert_eq!(parse_routing_decision(&rendered), RoutingParse::Found(decision));
}

#[test]
fn block_beats_sentinel() {
    let text = "## Decision\n```json\n{\"verdict\": \"reject\"}\n```\nDECISION: approve";
    match parse_routing_decision(text) {
        RoutingParse::Found(d) => assert_eq!(d.verdict, RoutingVerdict::Reject),
        other => panic!("{other:?}"),
    }
}
