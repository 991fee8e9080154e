// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_hosting::{FakeHost, HostingError};
use ralph_storage::StateStore;

fn store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open_writable(&dir.path().join("state.db")).unwrap();
    (dir, store)
}

#[test]
fn marker_id_is_12_hex_and_stable() {
    let id = alert_marker_id("watchdog:o/r#7");
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(id, alert_marker_id("watchdog:o/r#7"));
    assert_ne!(id, alert_marker_id("watchdog:o/r#8"));
    assert_eq!(alert_marker(&id), format!("<!-- ralph-alert:id={id} -->"));
}

#[tokio::test]
async fn first_write_posts_comment_with_marker() {
    let (_dir, store) = store();
    let host = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));

    let outcome =
        write_alert(&host, &store, "o/r", 7, "watchdog:o/r#7", "The agent stalled.", 1_000)
            .await
            .unwrap();
    assert!(outcome.posted_comment);
    assert!(!outcome.marker_found);
    assert!(!outcome.skipped_comment);

    let comments = host.comments("o/r", 7);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.starts_with("The agent stalled."));
    assert!(comments[0].body.contains(&alert_marker(&outcome.marker_id)));

    let delivery = store
        .get_alert_delivery("watchdog:o/r#7", "issue-comment", &outcome.marker_id)
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, "success");
    assert_eq!(delivery.attempts, 1);
    assert!(delivery.comment_id.is_some());
}

#[tokio::test]
async fn second_write_finds_marker_and_skips() {
    let (_dir, store) = store();
    let host = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));

    let first =
        write_alert(&host, &store, "o/r", 7, "watchdog:o/r#7", "The agent stalled.", 1_000)
            .await
            .unwrap();
    let second =
        write_alert(&host, &store, "o/r", 7, "watchdog:o/r#7", "The agent stalled.", 2_000)
            .await
            .unwrap();

    assert!(!second.posted_comment);
    assert!(second.marker_found);
    assert!(second.skipped_comment);
    assert_eq!(host.comments("o/r", 7).len(), 1, "still exactly one comment");

    let delivery = store
        .get_alert_delivery("watchdog:o/r#7", "issue-comment", &first.marker_id)
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, "skipped");
    assert_eq!(delivery.attempts, 2);
}

#[tokio::test]
async fn different_fingerprints_post_separately() {
    let (_dir, store) = store();
    let host = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));

    write_alert(&host, &store, "o/r", 7, "watchdog:o/r#7", "a", 1).await.unwrap();
    write_alert(&host, &store, "o/r", 7, "loop-trip:o/r#7", "b", 2).await.unwrap();
    assert_eq!(host.comments("o/r", 7).len(), 2);
}

#[tokio::test]
async fn failed_post_releases_the_key_for_retry() {
    let (_dir, store) = store();
    let host = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));
    host.fail_next("post_issue_comment", HostingError::Transient("503".to_string()));

    let err = write_alert(&host, &store, "o/r", 7, "fp", "body", 1).await.unwrap_err();
    assert_eq!(err.kind(), ralph_core::ErrorKind::Transient);

    let marker_id = alert_marker_id("fp");
    let delivery =
        store.get_alert_delivery("fp", "issue-comment", &marker_id).unwrap().unwrap();
    assert_eq!(delivery.status, "failed");

    // Retry succeeds because the key was released
    let outcome = write_alert(&host, &store, "o/r", 7, "fp", "body", 2).await.unwrap();
    assert!(outcome.posted_comment);
    assert_eq!(host.comments("o/r", 7).len(), 1);
}
