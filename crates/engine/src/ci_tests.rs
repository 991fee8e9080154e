// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_hosting::{CheckStatus, FakeHost};

fn failed_check(name: &str, log: &str) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status: CheckStatus::Failed,
        url: Some(format!("https://ci.example/{name}")),
        log_excerpt: Some(log.to_string()),
    }
}

#[test]
fn pure_infra_failures_classify_infra() {
    let payload = classify_ci_failure(
        &[failed_check("build", "Runner lost communication with the server")],
        1,
        3,
    );
    assert_eq!(payload.kind, "ci-triage");
    assert_eq!(payload.version, CLASSIFIER_VERSION);
    assert_eq!(payload.classification, CiClassification::Infra);
    assert_eq!(payload.action, CiAction::Resume);
    assert_eq!(payload.attempt, 1);
    assert_eq!(payload.max_attempts, 3);
}

#[test]
fn mixed_flake_and_infra_classifies_flake() {
    let payload = classify_ci_failure(
        &[
            failed_check("e2e", "test timed out waiting for server"),
            failed_check("build", "network error during fetch"),
        ],
        1,
        3,
    );
    assert_eq!(payload.classification, CiClassification::Flake);
    assert_eq!(payload.action, CiAction::Resume);
}

#[test]
fn any_real_failure_classifies_regression() {
    let payload = classify_ci_failure(
        &[
            failed_check("unit", "assertion failed: left == right"),
            failed_check("e2e", "flaky selector"),
        ],
        1,
        3,
    );
    assert_eq!(payload.classification, CiClassification::Regression);
    assert_eq!(payload.action, CiAction::Spawn);
}

#[test]
fn exhausted_attempts_quarantine() {
    let flaky = [failed_check("e2e", "flaky selector")];
    assert_eq!(classify_ci_failure(&flaky, 3, 3).action, CiAction::Quarantine);

    let broken = [failed_check("unit", "assertion failed")];
    assert_eq!(classify_ci_failure(&broken, 3, 3).action, CiAction::Quarantine);
}

#[test]
fn signature_is_stable_and_order_independent() {
    let a = failed_check("unit", "assertion failed: x");
    let b = failed_check("e2e", "timeout");
    let sig1 = failure_signature(&[a.clone(), b.clone()]);
    let sig2 = failure_signature(&[b, a.clone()]);
    assert_eq!(sig1, sig2);
    assert_eq!(sig1.len(), 16);
    assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));

    let different = failure_signature(&[a]);
    assert_ne!(sig1, different);
}

#[test]
fn payload_roundtrips_as_json() {
    let payload = classify_ci_failure(&[failed_check("unit", "boom")], 2, 3);
    let json = payload.to_json();
    let back: CiTriagePayload = serde_json::from_value(json).unwrap();
    assert_eq!(back, payload);
}

#[tokio::test]
async fn required_check_state_partitions() {
    let host = FakeHost::new()
        .with_required_checks("o/r", "bot/integration", &["build", "unit", "e2e"])
        .with_check_runs(
            "o/r",
            "sha-1",
            vec![
                CheckRun {
                    name: "build".to_string(),
                    status: CheckStatus::Passed,
                    url: None,
                    log_excerpt: None,
                },
                CheckRun {
                    name: "unit".to_string(),
                    status: CheckStatus::Failed,
                    url: None,
                    log_excerpt: Some("assert".to_string()),
                },
                // A non-required check never counts
                CheckRun {
                    name: "optional-lint".to_string(),
                    status: CheckStatus::Failed,
                    url: None,
                    log_excerpt: None,
                },
            ],
        );

    let (pending, failed) =
        required_check_state(&host, "o/r", "bot/integration", "sha-1").await.unwrap();
    assert_eq!(pending, ["e2e"], "unreported required checks are pending");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "unit");
}
