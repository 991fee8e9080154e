//! Gates JSON projection specs (schema version 2).

use crate::prelude::*;
use ralph_storage::{Gate, GateResultRecord, GateStatus, RunRecord, StateStore};

fn seed_run(root: &ControlRoot, run_id: &str) -> StateStore {
    std::fs::create_dir_all(root.root()).unwrap();
    let store = StateStore::open_writable(&root.db_path()).unwrap();
    store
        .create_run(&RunRecord {
            id: run_id.to_string(),
            repo: "acme/app".to_string(),
            issue_number: 42,
            task_ref: "tasks/app-42".to_string(),
            attempt_kind: "issue".to_string(),
            started_at_ms: 1_000,
            completed_at_ms: None,
            outcome: None,
            tokens: None,
        })
        .unwrap();
    store
}

#[test]
fn empty_store_yields_empty_projection() {
    let root = ControlRoot::new();
    let out = root.ralph().args(&["gates", "acme/app", "42", "--json"]).passes();
    let value = out.json();
    assert_eq!(value["version"], 2);
    assert_eq!(value["repo"], "acme/app");
    assert_eq!(value["issueNumber"], 42);
    assert!(value["runId"].is_null());
    assert!(value["error"].is_null());
}

#[test]
fn failed_ci_gate_with_artifact_projects_fully() {
    let root = ControlRoot::new();
    {
        let store = seed_run(&root, "run-1");
        store
            .upsert_run_gate_result(&GateResultRecord {
                status: GateStatus::Fail,
                url: Some("https://ci.example/check/9".to_string()),
                pr_number: Some(631),
                ..GateResultRecord::pending("run-1", Gate::Ci)
            })
            .unwrap();
        store
            .record_run_gate_artifact("run-1", Gate::Ci, "failure_excerpt", "short log")
            .unwrap();
    }

    let out = root.ralph().args(&["gates", "acme/app", "42", "--json"]).passes();
    let value = out.json();
    assert_eq!(value["version"], 2);
    assert_eq!(value["runId"], "run-1");

    let ci = value["gates"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["name"] == "ci")
        .cloned()
        .unwrap();
    assert_eq!(ci["status"], "fail");
    assert_eq!(ci["url"], "https://ci.example/check/9");
    assert_eq!(ci["prNumber"], 631);

    let artifact = &value["artifacts"][0];
    assert_eq!(artifact["gate"], "ci");
    assert_eq!(artifact["kind"], "failure_excerpt");
    assert_eq!(artifact["truncated"], false);
    assert_eq!(artifact["originalChars"], 9);
    assert_eq!(artifact["originalLines"], 1);
    assert_eq!(artifact["content"], "short log");
    assert!(value["error"].is_null());
}

#[test]
fn gate_rows_appear_in_canonical_order() {
    let root = ControlRoot::new();
    drop(seed_run(&root, "run-1"));
    let out = root.ralph().args(&["gates", "acme/app", "42", "--json"]).passes();
    let value = out.json();
    let names: Vec<String> = value["gates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap().to_string())
        .collect();
    similar_asserts::assert_eq!(
        names,
        vec!["preflight", "plan_review", "product_review", "devex_review", "ci", "pr_evidence"]
    );
}

#[test]
fn text_output_summarizes_gates() {
    let root = ControlRoot::new();
    {
        let store = seed_run(&root, "run-1");
        store
            .upsert_run_gate_result(&GateResultRecord {
                status: GateStatus::Pass,
                ..GateResultRecord::pending("run-1", Gate::Preflight)
            })
            .unwrap();
    }
    root.ralph()
        .args(&["gates", "acme/app", "42"])
        .passes()
        .stdout_has("acme/app#42")
        .stdout_has("preflight")
        .stdout_has("pass");
}
