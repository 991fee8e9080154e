// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-hosting: the code-hosting service contract
//!
//! The orchestrator consumes the hosting service (issues, pull requests,
//! checks, labels, comments) exclusively through [`HostingClient`]. Real
//! bindings live outside this workspace; tests script [`FakeHost`].

mod client;
mod error;
mod shared;
mod types;

pub use client::HostingClient;
pub use error::HostingError;
pub use shared::SharedClient;
pub use types::{
    CheckRun, CheckStatus, Comment, Issue, IssueState, MergeResult, PrState, PullRequest,
};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHost, HostCall};
