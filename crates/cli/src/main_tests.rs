// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[test]
fn gates_parses_repo_and_issue() {
    let cli = Cli::try_parse_from(["ralph", "gates", "acme/app", "42", "--json"]).unwrap();
    match cli.command {
        Commands::Gates { repo, issue, json } => {
            assert_eq!(repo, "acme/app");
            assert_eq!(issue, 42);
            assert!(json);
        }
        _ => panic!("expected gates"),
    }
}

#[test]
fn gates_rejects_non_numeric_issue() {
    assert!(Cli::try_parse_from(["ralph", "gates", "acme/app", "issue-42"]).is_err());
}

#[test]
fn nudge_takes_task_ref_and_message() {
    let cli = Cli::try_parse_from(["ralph", "nudge", "acme/app#42", "check the CI log"]).unwrap();
    match cli.command {
        Commands::Nudge { task_ref, message } => {
            assert_eq!(task_ref, "acme/app#42");
            assert_eq!(message, "check the CI log");
        }
        _ => panic!("expected nudge"),
    }
}

#[test]
fn watch_interval_defaults_to_two_seconds() {
    let cli = Cli::try_parse_from(["ralph", "watch"]).unwrap();
    match cli.command {
        Commands::Watch { interval } => assert_eq!(interval, 2),
        _ => panic!("expected watch"),
    }
}

#[test]
fn status_defaults_to_text() {
    let cli = Cli::try_parse_from(["ralph", "status"]).unwrap();
    match cli.command {
        Commands::Status { json } => assert!(!json),
        _ => panic!("expected status"),
    }
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    assert!(Cli::try_parse_from(["ralph"]).is_err());
}
