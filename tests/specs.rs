//! Behavioral specifications for the ralph CLI.
//!
//! These tests are black-box: they invoke the built `ralph` binary
//! against a throwaway control root and verify stdout, stderr, and exit
//! codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// gates/
#[path = "specs/gates/forward_compat.rs"]
mod gates_forward_compat;
#[path = "specs/gates/projection.rs"]
mod gates_projection;

// status/
#[path = "specs/status/offline.rs"]
mod status_offline;

// nudge/
#[path = "specs/nudge/append.rs"]
mod nudge_append;

// control/
#[path = "specs/control/resume.rs"]
mod control_resume;

// repos/
#[path = "specs/repos/list.rs"]
mod repos_list;
