// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error classification.
//!
//! Structural failures carry a stable code so CLI JSON output can surface
//! them without string matching.

use ralph_core::ErrorKind;
use thiserror::Error;

/// Errors from the durable state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "durable state schema {schema_version} is newer than this binary supports \
         (supported ≤ {max_supported}, writable ≤ {max_writable})"
    )]
    ForwardIncompatible {
        schema_version: i64,
        max_supported: i64,
        max_writable: i64,
    },

    #[error("durable state is corrupt: {0}")]
    Corrupt(String),

    #[error("store is open read-only")]
    ReadOnly,

    #[error("invalid store operation: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl StoreError {
    /// Stable code for JSON envelopes and exit-code mapping.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::ForwardIncompatible { .. } => "forward_incompatible",
            StoreError::Corrupt(_) => "corrupt",
            StoreError::ReadOnly => "read_only",
            StoreError::Validation(_) => "validation",
            StoreError::Io(_) | StoreError::Sql(_) => "io",
        }
    }

    /// Error-taxonomy kind for propagation policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ForwardIncompatible { .. } => ErrorKind::ForwardIncompatible,
            StoreError::Validation(_) | StoreError::ReadOnly | StoreError::Corrupt(_) => {
                ErrorKind::Validation
            }
            StoreError::Io(_) | StoreError::Sql(_) => ErrorKind::Transient,
        }
    }
}
