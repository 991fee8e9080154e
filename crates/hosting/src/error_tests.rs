// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    unauthorized = { 401, ErrorKind::Auth },
    forbidden = { 403, ErrorKind::Auth },
    not_found = { 404, ErrorKind::Validation },
    timeout = { 408, ErrorKind::Transient },
    rate_limited = { 429, ErrorKind::Transient },
    server_error = { 500, ErrorKind::Transient },
    bad_gateway = { 502, ErrorKind::Transient },
    unprocessable = { 422, ErrorKind::Validation },
)]
fn status_classification(status: u16, kind: ErrorKind) {
    assert_eq!(HostingError::from_status(status, "x").kind(), kind);
}

#[test]
fn label_missing_detection() {
    let err = HostingError::Validation("label does not exist: queue/blocked".to_string());
    assert!(err.is_label_missing());
    assert!(!HostingError::Validation("other".to_string()).is_label_missing());
    assert!(!HostingError::Transient("label does not exist".to_string()).is_label_missing());
}

#[test]
fn base_modified_detection() {
    let err = HostingError::Validation("base branch was modified".to_string());
    assert!(err.is_base_modified());
    assert!(!HostingError::Validation("merge conflict".to_string()).is_base_modified());
}
