//! CLI usage-error specs.
//!
//! Usage problems exit 1; code 2 is reserved for forward-incompatible
//! durable state and single-instance refusal.

use crate::prelude::*;

#[test]
fn no_subcommand_is_a_usage_error() {
    ControlRoot::new().ralph().exits(1);
}

#[test]
fn unknown_subcommand_exits_1() {
    ControlRoot::new().ralph().args(&["frobnicate"]).exits(1);
}

#[test]
fn gates_requires_repo_and_issue() {
    ControlRoot::new().ralph().args(&["gates"]).exits(1);
    ControlRoot::new().ralph().args(&["gates", "acme/app"]).exits(1);
}

#[test]
fn gates_rejects_non_numeric_issue() {
    ControlRoot::new().ralph().args(&["gates", "acme/app", "not-a-number"]).exits(1);
}

#[test]
fn nudge_requires_message() {
    ControlRoot::new().ralph().args(&["nudge", "acme/app#1"]).exits(1);
}
