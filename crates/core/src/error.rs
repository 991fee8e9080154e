// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across subsystems.
//!
//! Errors are classified by kind, not by type: the worker's retry/block/
//! escalate policy and the CLI's exit codes key off the kind alone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an operational error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, secondary rate limit, 5xx. Retried with backoff within the
    /// operation.
    Transient,
    /// Authentication or authorization failure. Fatal to the operation.
    Auth,
    /// Bad input or schema mismatch. Fatal to the operation, surfaced.
    Validation,
    /// Durable state newer than this binary supports. Fatal to the process.
    ForwardIncompatible,
    /// Two healthy daemons on one control root. Fatal to startup.
    Conflict,
    /// Worktree equals repo root, unsafe session id. Refused, never retried.
    Safety,
}

impl ErrorKind {
    /// Stable code string for JSON envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::ForwardIncompatible => "forward_incompatible",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Safety => "safety",
        }
    }

    /// Process exit code when this kind terminates a CLI invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::ForwardIncompatible | ErrorKind::Conflict => 2,
            _ => 1,
        }
    }

    /// Whether the worker may retry the failed operation in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
