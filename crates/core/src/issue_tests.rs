// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn parses_wellformed_reference() {
    let r: IssueRef = "3mdistal/ralph#319".parse().unwrap();
    assert_eq!(r.owner, "3mdistal");
    assert_eq!(r.name, "ralph");
    assert_eq!(r.number, 319);
    assert_eq!(r.repo(), "3mdistal/ralph");
    assert_eq!(r.to_string(), "3mdistal/ralph#319");
}

#[yare::parameterized(
    no_hash = { "owner/name" },
    no_slash = { "ownername#3" },
    empty_owner = { "/name#3" },
    empty_name = { "owner/#3" },
    extra_slash = { "a/b/c#3" },
    bad_number = { "a/b#x" },
    empty = { "" },
)]
fn rejects_malformed_references(input: &str) {
    assert!(input.parse::<IssueRef>().is_err());
}

#[test]
fn serde_uses_string_form() {
    let r: IssueRef = "o/r#12".parse().unwrap();
    assert_eq!(serde_json::to_string(&r).unwrap(), "\"o/r#12\"");
    let back: IssueRef = serde_json::from_str("\"o/r#12\"").unwrap();
    assert_eq!(back, r);
}

#[yare::parameterized(
    plain = { "notes/task", "notes/task" },
    wrapped = { "[[notes/task]]", "notes/task" },
    padded = { "  [[notes/task]]  ", "notes/task" },
    crlf = { "[[notes/task]]\r\n", "notes/task" },
    inner_padding = { "[[ notes/task ]]", "notes/task" },
    unbalanced = { "[[notes/task", "[[notes/task" },
    embedded_newline = { "[[no\r\ntes]]", "notes" },
)]
fn normalize_cases(input: &str, expected: &str) {
    assert_eq!(normalize_note_ref(input), expected);
}

#[test]
fn sanitize_strips_crlf_and_whitespace() {
    assert_eq!(sanitize_note_ref("  a\r\nb \r\n"), "ab");
    assert_eq!(sanitize_note_ref("plain"), "plain");
}

proptest! {
    // sanitize and normalize commute for arbitrary input
    #[test]
    fn sanitize_normalize_commute(input in ".{0,64}") {
        prop_assert_eq!(
            sanitize_note_ref(&normalize_note_ref(&input)),
            normalize_note_ref(&sanitize_note_ref(&input))
        );
    }

    #[test]
    fn normalize_is_idempotent(input in ".{0,64}") {
        let once = normalize_note_ref(&input);
        prop_assert_eq!(normalize_note_ref(&once), once);
    }
}
