// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-storage: durable state for the orchestrator
//!
//! Two stores live here. The SQLite-backed [`StateStore`] owns runs, gate
//! results, artifacts, idempotency keys, alert deliveries, and loop-triage
//! attempts. The filesystem-backed [`FsQueueStore`] owns task records.

mod artifacts;
mod error;
mod gates;
mod queue;
mod schema;
mod store;

pub use artifacts::{truncate_for_kind, ArtifactPolicy, TruncationMode, ARTIFACT_POLICY_VERSION};
pub use error::StoreError;
pub use gates::{
    ArtifactRecord, Gate, GateResultRecord, GateStatus, RunGateState, RunRecord, TokenTotals,
};
pub use queue::{FsQueueStore, QueueError, QueueStore};
#[cfg(any(test, feature = "test-support"))]
pub use queue::MemQueueStore;
pub use schema::{StoreProbe, MAX_SUPPORTED_SCHEMA, MAX_WRITABLE_SCHEMA, SCHEMA_VERSION};
pub use store::{AlertDelivery, IdempotencyClaim, StateStore, StoreMode, TriageAttempt};
