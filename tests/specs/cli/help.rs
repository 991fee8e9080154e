//! CLI help specs.

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    ControlRoot::new()
        .ralph()
        .args(&["--help"])
        .passes()
        .stdout_has("status")
        .stdout_has("gates")
        .stdout_has("nudge")
        .stdout_has("resume")
        .stdout_has("repos");
}

#[test]
fn version_prints_and_exits_zero() {
    ControlRoot::new().ralph().args(&["--version"]).passes().stdout_has("ralph");
}

#[test]
fn subcommand_help_shows_flags() {
    ControlRoot::new()
        .ralph()
        .args(&["gates", "--help"])
        .passes()
        .stdout_has("--json");
}
