// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_msg(dir: &Path, session: &str, name: &str, json: &serde_json::Value) {
    let session_dir = dir.join("sessions").join(session);
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(session_dir.join(name), serde_json::to_vec(json).unwrap()).unwrap();
}

fn assistant_msg(ts: u64, input: u64, output: u64, reasoning: u64) -> serde_json::Value {
    serde_json::json!({
        "role": "assistant",
        "provider": "anthropic",
        "ts": ts,
        "usage": {
            "input_tokens": input,
            "output_tokens": output,
            "reasoning_tokens": reasoning,
        }
    })
}

#[test]
fn scans_assistant_messages_for_matching_provider() {
    let dir = tempfile::tempdir().unwrap();
    write_msg(dir.path(), "s1", "msg_001.json", &assistant_msg(2_000, 10, 5, 2));
    write_msg(dir.path(), "s1", "msg_002.json", &assistant_msg(1_000, 1, 1, 0));
    write_msg(
        dir.path(),
        "s2",
        "msg_001.json",
        &serde_json::json!({"role": "user", "provider": "anthropic", "ts": 3_000}),
    );
    write_msg(
        dir.path(),
        "s2",
        "msg_002.json",
        &{
            let mut m = assistant_msg(4_000, 9, 9, 9);
            m["provider"] = serde_json::json!("other");
            m
        },
    );

    let events = scan_profile_usage(dir.path(), "anthropic", 0);
    assert_eq!(
        events,
        [UsageEvent { ts_ms: 1_000, tokens: 2 }, UsageEvent { ts_ms: 2_000, tokens: 17 }],
        "sorted by timestamp, user and foreign-provider messages ignored"
    );
}

#[test]
fn filters_by_minimum_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    write_msg(dir.path(), "s1", "msg_old.json", &assistant_msg(100, 50, 0, 0));
    write_msg(dir.path(), "s1", "msg_new.json", &assistant_msg(9_000, 7, 0, 0));

    let events = scan_profile_usage(dir.path(), "anthropic", 5_000);
    assert_eq!(events, [UsageEvent { ts_ms: 9_000, tokens: 7 }]);
}

#[test]
fn skips_non_message_files_and_garbage() {
    let dir = tempfile::tempdir().unwrap();
    write_msg(dir.path(), "s1", "msg_good.json", &assistant_msg(1_000, 1, 0, 0));
    let session_dir = dir.path().join("sessions").join("s1");
    std::fs::write(session_dir.join("msg_bad.json"), b"not json at all").unwrap();
    std::fs::write(session_dir.join("metadata.json"), b"{}").unwrap();
    std::fs::write(session_dir.join("msg_notjson.txt"), b"x").unwrap();

    let events = scan_profile_usage(dir.path(), "anthropic", 0);
    assert_eq!(events.len(), 1);
}

#[test]
fn missing_store_scans_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(scan_profile_usage(&dir.path().join("ghost"), "anthropic", 0).is_empty());
}
