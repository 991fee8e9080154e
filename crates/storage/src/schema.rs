// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema versioning and migrations.
//!
//! The version is a monotonic integer. This binary writes schema
//! [`SCHEMA_VERSION`]; it can still read one version further ahead, and
//! refuses anything beyond that. Down-migrations do not exist.

use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// The schema this binary creates and writes.
pub const SCHEMA_VERSION: i64 = 2;
/// Highest schema this binary opens read-write.
pub const MAX_WRITABLE_SCHEMA: i64 = 2;
/// Highest schema this binary opens at all (read-only above writable).
pub const MAX_SUPPORTED_SCHEMA: i64 = 3;

/// Result of probing a store file before opening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProbe {
    /// Schema within the writable range (or no store yet).
    Ok { schema_version: i64 },
    /// Schema newer than writable but still readable: open read-only.
    ReadableForward { schema_version: i64 },
    /// Schema beyond support: refuse with exit code 2.
    ForwardIncompatible { schema_version: i64 },
}

impl StoreProbe {
    /// Classify a raw schema version.
    pub fn classify(schema_version: i64) -> Self {
        if schema_version <= MAX_WRITABLE_SCHEMA {
            StoreProbe::Ok { schema_version }
        } else if schema_version <= MAX_SUPPORTED_SCHEMA {
            StoreProbe::ReadableForward { schema_version }
        } else {
            StoreProbe::ForwardIncompatible { schema_version }
        }
    }
}

/// Probe a store file without modifying it.
///
/// A missing file probes as `Ok` with version 0 (a writable open will
/// create it).
pub fn probe(path: &Path) -> Result<StoreProbe, StoreError> {
    if !path.exists() {
        return Ok(StoreProbe::Ok { schema_version: 0 });
    }
    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let version = read_version(&conn)?.unwrap_or(0);
    Ok(StoreProbe::classify(version))
}

/// Read the recorded schema version; `None` when the version table is
/// absent (fresh or foreign database).
pub(crate) fn read_version(conn: &Connection) -> Result<Option<i64>, StoreError> {
    let has_table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            params![],
            |row| row.get(0),
        )
        .optional()?;
    if has_table.is_none() {
        return Ok(None);
    }
    let version: Option<i64> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    Ok(version)
}

pub(crate) fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA journal_mode = wal;")?;
    conn.busy_timeout(std::time::Duration::from_millis(5_000))?;
    Ok(())
}

/// Create or upgrade the schema to [`SCHEMA_VERSION`].
///
/// Each migration step is one transaction; a crash mid-upgrade leaves the
/// previous version intact.
pub(crate) fn initialize(conn: &mut Connection) -> Result<(), StoreError> {
    loop {
        let version = read_version(conn)?.unwrap_or(0);
        match version {
            0 => migrate_v1(conn)?,
            1 => migrate_v2(conn)?,
            v if v == SCHEMA_VERSION => return Ok(()),
            v if v > MAX_WRITABLE_SCHEMA => {
                return Err(StoreError::ForwardIncompatible {
                    schema_version: v,
                    max_supported: MAX_SUPPORTED_SCHEMA,
                    max_writable: MAX_WRITABLE_SCHEMA,
                });
            }
            v => {
                return Err(StoreError::Corrupt(format!(
                    "unexpected schema version {v} during init"
                )));
            }
        }
    }
}

fn migrate_v1(conn: &mut Connection) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
         CREATE TABLE runs (
             id TEXT PRIMARY KEY,
             repo TEXT NOT NULL,
             issue_number INTEGER NOT NULL,
             task_ref TEXT NOT NULL,
             attempt_kind TEXT NOT NULL,
             started_at_ms INTEGER NOT NULL,
             completed_at_ms INTEGER,
             outcome TEXT,
             input_tokens INTEGER,
             output_tokens INTEGER,
             reasoning_tokens INTEGER
         );
         CREATE INDEX idx_runs_repo_issue ON runs (repo, issue_number, started_at_ms);
         CREATE TABLE run_gates (
             run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
             gate TEXT NOT NULL,
             status TEXT NOT NULL DEFAULT 'pending',
             command TEXT,
             skip_reason TEXT,
             reason TEXT,
             url TEXT,
             pr_number INTEGER,
             pr_url TEXT,
             PRIMARY KEY (run_id, gate)
         );
         CREATE TABLE gate_artifacts (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
             gate TEXT NOT NULL,
             kind TEXT NOT NULL,
             content TEXT NOT NULL,
             truncated INTEGER NOT NULL,
             truncation_mode TEXT NOT NULL,
             original_chars INTEGER NOT NULL,
             original_lines INTEGER NOT NULL,
             policy_version INTEGER NOT NULL
         );
         CREATE INDEX idx_gate_artifacts_run ON gate_artifacts (run_id);
         CREATE TABLE idempotency_keys (
             scope TEXT NOT NULL,
             key TEXT NOT NULL,
             payload TEXT NOT NULL,
             created_at_ms INTEGER NOT NULL,
             PRIMARY KEY (scope, key)
         );
         CREATE TABLE alert_deliveries (
             alert_id TEXT NOT NULL,
             channel TEXT NOT NULL,
             marker_id TEXT NOT NULL,
             target_type TEXT NOT NULL,
             target_number INTEGER NOT NULL,
             status TEXT NOT NULL,
             attempts INTEGER NOT NULL DEFAULT 1,
             comment_id TEXT,
             last_error TEXT,
             updated_at_ms INTEGER NOT NULL,
             PRIMARY KEY (alert_id, channel, marker_id)
         );
         CREATE TABLE loop_triage_attempts (
             repo TEXT NOT NULL,
             issue_number INTEGER NOT NULL,
             signature TEXT NOT NULL,
             attempts INTEGER NOT NULL DEFAULT 0,
             last_attempt_at_ms INTEGER NOT NULL,
             PRIMARY KEY (repo, issue_number, signature)
         );
         DELETE FROM schema_version;
         INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;
    Ok(())
}

fn migrate_v2(conn: &mut Connection) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "ALTER TABLE run_gates ADD COLUMN classifier_version INTEGER;
         ALTER TABLE run_gates ADD COLUMN classifier_payload TEXT;
         UPDATE schema_version SET version = 2;",
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
