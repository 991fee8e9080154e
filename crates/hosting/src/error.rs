// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosting error classification.

use ralph_core::ErrorKind;
use thiserror::Error;

/// Errors from hosting-service operations
#[derive(Debug, Clone, Error)]
pub enum HostingError {
    /// Timeout, secondary rate limit, 5xx. Safe to retry with backoff.
    #[error("transient hosting error: {0}")]
    Transient(String),

    #[error("hosting authentication failed: {0}")]
    Auth(String),

    #[error("hosting validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl HostingError {
    /// Classify an HTTP status code the way the worker's retry policy
    /// expects.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => HostingError::Auth(message),
            404 => HostingError::NotFound(message),
            408 | 429 => HostingError::Transient(message),
            s if s >= 500 => HostingError::Transient(message),
            _ => HostingError::Validation(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HostingError::Transient(_) => ErrorKind::Transient,
            HostingError::Auth(_) => ErrorKind::Auth,
            HostingError::Validation(_) | HostingError::NotFound(_) => ErrorKind::Validation,
        }
    }

    /// The one validation error the label writeback retries after creating
    /// the label.
    pub fn is_label_missing(&self) -> bool {
        matches!(self, HostingError::Validation(m) if m.contains("label does not exist"))
    }

    /// The merge conflict that retries via update-branch.
    pub fn is_base_modified(&self) -> bool {
        matches!(self, HostingError::Validation(m) if m.contains("base branch was modified"))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
