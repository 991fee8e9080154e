// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_tool_start_with_patch() {
    let line = r#"{"type":"tool_start","ts":1000,"sessionId":"s1","tool":{"name":"apply_patch","input":{"patchText":"*** Update File: src/main.rs\n"}}}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    assert_eq!(event.kind, EventKind::ToolStart);
    assert_eq!(event.ts, 1000);
    assert_eq!(event.session_id.as_deref(), Some("s1"));
    assert_eq!(event.tool_name(), Some("apply_patch"));
    assert!(event.patch_text().unwrap().contains("Update File"));
}

#[test]
fn parses_bash_command() {
    let line = r#"{"type":"tool_start","ts":5,"tool":{"name":"bash","input":{"command":"cargo test"}}}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    assert_eq!(event.bash_command(), Some("cargo test"));

    // Non-bash tools never surface a command
    let line = r#"{"type":"tool_start","ts":5,"tool":{"name":"search","input":{"command":"x"}}}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    assert_eq!(event.bash_command(), None);
}

#[test]
fn unknown_fields_are_preserved() {
    let line = r#"{"type":"message","ts":7,"text":"hi","novel":{"a":1}}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    assert_eq!(event.text.as_deref(), Some("hi"));
    assert_eq!(event.extra.get("novel").unwrap()["a"], 1);
}

#[test]
fn structured_pr_signal() {
    let line = r#"{"type":"session","ts":9,"prUrl":"https://example.com/o/r/pull/5"}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    assert_eq!(event.pr_url.as_deref(), Some("https://example.com/o/r/pull/5"));
}

#[yare::parameterized(
    empty = { "" },
    whitespace = { "   " },
)]
fn empty_lines_are_distinct_errors(line: &str) {
    assert!(matches!(AgentEvent::parse_line(line), Err(ProtocolError::Empty)));
}

#[yare::parameterized(
    not_json = { "garbage" },
    wrong_type = { r#"{"type":"warp_drive","ts":1}"# },
    missing_ts = { r#"{"type":"message"}"# },
)]
fn malformed_lines_are_malformed(line: &str) {
    assert!(matches!(AgentEvent::parse_line(line), Err(ProtocolError::Malformed(_))));
}

#[test]
fn event_roundtrips_through_serde() {
    let line = r#"{"type":"tool_end","ts":11,"tool":{"name":"bash","input":{}}}"#;
    let event = AgentEvent::parse_line(line).unwrap();
    let text = serde_json::to_string(&event).unwrap();
    let back = AgentEvent::parse_line(&text).unwrap();
    assert_eq!(back, event);
}
