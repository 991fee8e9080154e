// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::FakeHost;

#[tokio::test]
async fn delegates_reads_and_writes() {
    let fake = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "title"));
    let client = SharedClient::new(fake, 4, 1);

    let issue = client.get_issue("o/r", 7).await.unwrap();
    assert_eq!(issue.number, 7);

    let comment = client.post_issue_comment("o/r", 7, "hello").await.unwrap();
    assert_eq!(comment.body, "hello");
}

#[tokio::test]
async fn serializes_writes_when_limit_is_one() {
    let fake = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));
    let client = std::sync::Arc::new(SharedClient::new(fake, 1, 1));

    // A pile of concurrent writes all complete (no deadlock, no panic);
    // the single write permit forces them through one at a time.
    let mut handles = Vec::new();
    for i in 0..8 {
        let client = std::sync::Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.post_issue_comment("o/r", 7, &format!("c{i}")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let comments = client.list_issue_comments("o/r", 7).await.unwrap();
    assert_eq!(comments.len(), 8);
}

#[tokio::test]
async fn scripted_errors_pass_through_classification() {
    let fake = FakeHost::new().with_issue("o/r", FakeHost::open_issue(7, "t"));
    fake.fail_next("get_issue", HostingError::Transient("secondary rate limit".to_string()));
    let client = SharedClient::new(fake, 2, 1);

    let err = client.get_issue("o/r", 7).await.unwrap_err();
    assert_eq!(err.kind(), ralph_core::ErrorKind::Transient);
    // Next call succeeds
    assert!(client.get_issue("o/r", 7).await.is_ok());
}
