// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The SQLite-backed durable state store.
//!
//! One connection behind a mutex; write transactions serialize, which is
//! the concurrency contract every caller relies on. The idempotency-key
//! insert is the linearization point for replayable side-effects.

use crate::artifacts::{truncate_for_kind, ARTIFACT_POLICY_VERSION};
use crate::error::StoreError;
use crate::gates::{
    ArtifactRecord, Gate, GateResultRecord, GateStatus, RunGateState, RunRecord, TokenTotals,
};
use crate::schema;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the store was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    ReadWrite,
    ReadOnly,
}

/// Outcome of an idempotency-key claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyClaim {
    /// This caller inserted the key; it owns the side-effect.
    Claimed,
    /// The key already existed.
    Duplicate,
}

/// Recorded alert writeback attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDelivery {
    pub alert_id: String,
    pub channel: String,
    pub marker_id: String,
    pub target_type: String,
    pub target_number: u64,
    pub status: String,
    pub attempts: u32,
    pub comment_id: Option<String>,
    pub last_error: Option<String>,
    pub updated_at_ms: u64,
}

/// Loop-triage attempt counter for one (repo, issue, signature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageAttempt {
    pub repo: String,
    pub issue_number: u64,
    pub signature: String,
    pub attempts: u32,
    pub last_attempt_at_ms: u64,
}

/// Durable state store.
#[derive(Debug)]
pub struct StateStore {
    conn: Mutex<Connection>,
    mode: StoreMode,
    path: PathBuf,
}

impl StateStore {
    /// Open read-write, creating or upgrading the schema as needed.
    pub fn open_writable(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match schema::probe(path)? {
            schema::StoreProbe::Ok { .. } => {}
            schema::StoreProbe::ReadableForward { schema_version }
            | schema::StoreProbe::ForwardIncompatible { schema_version } => {
                return Err(StoreError::ForwardIncompatible {
                    schema_version,
                    max_supported: schema::MAX_SUPPORTED_SCHEMA,
                    max_writable: schema::MAX_WRITABLE_SCHEMA,
                });
            }
        }
        let mut conn = Connection::open(path)?;
        schema::apply_pragmas(&conn)?;
        schema::initialize(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn), mode: StoreMode::ReadWrite, path: path.to_path_buf() })
    }

    /// Open read-only. Accepts readable-forward schemas; refuses beyond.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        match schema::probe(path)? {
            schema::StoreProbe::Ok { .. } | schema::StoreProbe::ReadableForward { .. } => {}
            schema::StoreProbe::ForwardIncompatible { schema_version } => {
                return Err(StoreError::ForwardIncompatible {
                    schema_version,
                    max_supported: schema::MAX_SUPPORTED_SCHEMA,
                    max_writable: schema::MAX_WRITABLE_SCHEMA,
                });
            }
        }
        let conn =
            Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn: Mutex::new(conn), mode: StoreMode::ReadOnly, path: path.to_path_buf() })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn require_writable(&self) -> Result<(), StoreError> {
        match self.mode {
            StoreMode::ReadWrite => Ok(()),
            StoreMode::ReadOnly => Err(StoreError::ReadOnly),
        }
    }

    // ---------------------------------------------------------------------
    // Runs and gates
    // ---------------------------------------------------------------------

    /// Insert a run and one pending row per canonical gate, atomically.
    pub fn create_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.require_writable()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO runs (id, repo, issue_number, task_ref, attempt_kind, started_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.id,
                run.repo,
                run.issue_number as i64,
                run.task_ref,
                run.attempt_kind,
                run.started_at_ms as i64,
            ],
        )?;
        for gate in Gate::CANONICAL {
            tx.execute(
                "INSERT INTO run_gates (run_id, gate, status) VALUES (?1, ?2, 'pending')",
                params![run.id, gate.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert any missing pending gate rows for a run (recovery path).
    pub fn ensure_run_gate_rows(&self, run_id: &str) -> Result<(), StoreError> {
        self.require_writable()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for gate in Gate::CANONICAL {
            tx.execute(
                "INSERT OR IGNORE INTO run_gates (run_id, gate, status)
                 VALUES (?1, ?2, 'pending')",
                params![run_id, gate.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Update one gate row, enforcing the monotonic status rule.
    pub fn upsert_run_gate_result(&self, record: &GateResultRecord) -> Result<(), StoreError> {
        self.require_writable()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM run_gates WHERE run_id = ?1 AND gate = ?2",
                params![record.run_id, record.gate.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let current = match current {
            Some(s) => GateStatus::from_str(&s).map_err(StoreError::Corrupt)?,
            None => {
                return Err(StoreError::Validation(format!(
                    "no gate row for run {} gate {}",
                    record.run_id, record.gate
                )));
            }
        };
        if !current.can_become(record.status) {
            return Err(StoreError::Validation(format!(
                "gate {} of run {} is terminal ({}); refusing {}",
                record.gate, record.run_id, current, record.status
            )));
        }
        let classifier_payload = record
            .classifier_payload
            .as_ref()
            .map(|p| serde_json::to_string(p))
            .transpose()
            .map_err(|e| StoreError::Validation(format!("classifier payload: {e}")))?;
        tx.execute(
            "UPDATE run_gates SET status = ?3, command = ?4, skip_reason = ?5, reason = ?6,
                 url = ?7, pr_number = ?8, pr_url = ?9, classifier_version = ?10,
                 classifier_payload = ?11
             WHERE run_id = ?1 AND gate = ?2",
            params![
                record.run_id,
                record.gate.as_str(),
                record.status.as_str(),
                record.command,
                record.skip_reason,
                record.reason,
                record.url,
                record.pr_number.map(|n| n as i64),
                record.pr_url,
                record.classifier_version,
                classifier_payload,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Store a gate artifact after applying the kind's truncation policy.
    ///
    /// Returns the artifact row id.
    pub fn record_run_gate_artifact(
        &self,
        run_id: &str,
        gate: Gate,
        kind: &str,
        content: &str,
    ) -> Result<i64, StoreError> {
        self.require_writable()?;
        let truncated = truncate_for_kind(kind, content);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO gate_artifacts
                 (run_id, gate, kind, content, truncated, truncation_mode,
                  original_chars, original_lines, policy_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                gate.as_str(),
                kind,
                truncated.content,
                truncated.truncated,
                truncated.mode.as_str(),
                truncated.original_chars as i64,
                truncated.original_lines as i64,
                ARTIFACT_POLICY_VERSION,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a run's terminal outcome.
    ///
    /// Token totals are stored only when complete; a partial sum is dropped
    /// to NULL as a group.
    pub fn finalize_run(
        &self,
        run_id: &str,
        outcome: &str,
        completed_at_ms: u64,
        tokens: Option<TokenTotals>,
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE runs SET outcome = ?2, completed_at_ms = ?3,
                 input_tokens = ?4, output_tokens = ?5, reasoning_tokens = ?6
             WHERE id = ?1",
            params![
                run_id,
                outcome,
                completed_at_ms as i64,
                tokens.map(|t| t.input as i64),
                tokens.map(|t| t.output as i64),
                tokens.map(|t| t.reasoning as i64),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::Validation(format!("no run {run_id} to finalize")));
        }
        Ok(())
    }

    /// The latest run for an issue together with its gate rows and
    /// artifacts, in canonical gate order.
    pub fn latest_run_gate_state_for_issue(
        &self,
        repo: &str,
        issue_number: u64,
    ) -> Result<Option<RunGateState>, StoreError> {
        let conn = self.conn.lock();
        let run: Option<RunRecord> = conn
            .query_row(
                "SELECT id, repo, issue_number, task_ref, attempt_kind, started_at_ms,
                        completed_at_ms, outcome, input_tokens, output_tokens, reasoning_tokens
                 FROM runs WHERE repo = ?1 AND issue_number = ?2
                 ORDER BY started_at_ms DESC, rowid DESC LIMIT 1",
                params![repo, issue_number as i64],
                row_to_run,
            )
            .optional()?;
        let Some(run) = run else { return Ok(None) };

        let mut gates = Vec::with_capacity(Gate::CANONICAL.len());
        {
            let mut stmt = conn.prepare(
                "SELECT gate, status, command, skip_reason, reason, url, pr_number, pr_url,
                        classifier_version, classifier_payload
                 FROM run_gates WHERE run_id = ?1",
            )?;
            let rows = stmt.query_map(params![run.id], |row| {
                let gate: String = row.get(0)?;
                let status: String = row.get(1)?;
                let payload: Option<String> = row.get(9)?;
                Ok((
                    gate,
                    status,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<u32>>(8)?,
                    payload,
                ))
            })?;
            let mut by_gate = std::collections::HashMap::new();
            for row in rows {
                let (gate, status, command, skip_reason, reason, url, pr_number, pr_url, cv, cp) =
                    row?;
                let gate = Gate::from_str(&gate).map_err(StoreError::Corrupt)?;
                let status = GateStatus::from_str(&status).map_err(StoreError::Corrupt)?;
                let classifier_payload = cp
                    .map(|p| serde_json::from_str(&p))
                    .transpose()
                    .map_err(|e| StoreError::Corrupt(format!("classifier payload: {e}")))?;
                by_gate.insert(
                    gate,
                    GateResultRecord {
                        run_id: run.id.clone(),
                        gate,
                        status,
                        command,
                        skip_reason,
                        reason,
                        url,
                        pr_number: pr_number.map(|n| n as u64),
                        pr_url,
                        classifier_version: cv,
                        classifier_payload,
                    },
                );
            }
            for gate in Gate::CANONICAL {
                if let Some(record) = by_gate.remove(&gate) {
                    gates.push(record);
                }
            }
        }

        let mut artifacts = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT id, gate, kind, content, truncated, truncation_mode,
                        original_chars, original_lines, policy_version
                 FROM gate_artifacts WHERE run_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![run.id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, u32>(8)?,
                ))
            })?;
            for row in rows {
                let (id, gate, kind, content, truncated, mode, chars, lines, policy) = row?;
                artifacts.push(ArtifactRecord {
                    id,
                    run_id: run.id.clone(),
                    gate: Gate::from_str(&gate).map_err(StoreError::Corrupt)?,
                    kind,
                    content,
                    truncated,
                    truncation_mode: mode.parse().map_err(StoreError::Corrupt)?,
                    original_chars: chars as u64,
                    original_lines: lines as u64,
                    policy_version: policy,
                });
            }
        }

        Ok(Some(RunGateState { run, gates, artifacts }))
    }

    // ---------------------------------------------------------------------
    // Idempotency keys
    // ---------------------------------------------------------------------

    pub fn has_key(&self, scope: &str, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM idempotency_keys WHERE scope = ?1 AND key = ?2",
                params![scope, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Claim a key. Exactly one caller across all processes observes
    /// [`IdempotencyClaim::Claimed`]; everyone else gets `Duplicate`.
    pub fn record_key(
        &self,
        scope: &str,
        key: &str,
        payload: &serde_json::Value,
        now_ms: u64,
    ) -> Result<IdempotencyClaim, StoreError> {
        self.require_writable()?;
        let conn = self.conn.lock();
        let payload = serde_json::to_string(payload)
            .map_err(|e| StoreError::Validation(format!("idempotency payload: {e}")))?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO idempotency_keys (scope, key, payload, created_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![scope, key, payload, now_ms as i64],
        )?;
        Ok(if inserted == 1 { IdempotencyClaim::Claimed } else { IdempotencyClaim::Duplicate })
    }

    /// Release a key after the guarded side-effect failed for certain.
    pub fn delete_key(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        self.require_writable()?;
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM idempotency_keys WHERE scope = ?1 AND key = ?2",
            params![scope, key],
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Alert deliveries
    // ---------------------------------------------------------------------

    /// Record one writeback attempt; repeated attempts for the same
    /// (alert, channel, marker) increment the counter in place.
    #[allow(clippy::too_many_arguments)]
    pub fn record_alert_attempt(
        &self,
        alert_id: &str,
        channel: &str,
        marker_id: &str,
        target_type: &str,
        target_number: u64,
        status: &str,
        comment_id: Option<&str>,
        error: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        self.require_writable()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alert_deliveries
                 (alert_id, channel, marker_id, target_type, target_number, status,
                  attempts, comment_id, last_error, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9)
             ON CONFLICT (alert_id, channel, marker_id) DO UPDATE SET
                 status = excluded.status,
                 attempts = alert_deliveries.attempts + 1,
                 comment_id = COALESCE(excluded.comment_id, alert_deliveries.comment_id),
                 last_error = excluded.last_error,
                 updated_at_ms = excluded.updated_at_ms",
            params![
                alert_id,
                channel,
                marker_id,
                target_type,
                target_number as i64,
                status,
                comment_id,
                error,
                now_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_alert_delivery(
        &self,
        alert_id: &str,
        channel: &str,
        marker_id: &str,
    ) -> Result<Option<AlertDelivery>, StoreError> {
        let conn = self.conn.lock();
        let delivery = conn
            .query_row(
                "SELECT alert_id, channel, marker_id, target_type, target_number, status,
                        attempts, comment_id, last_error, updated_at_ms
                 FROM alert_deliveries
                 WHERE alert_id = ?1 AND channel = ?2 AND marker_id = ?3",
                params![alert_id, channel, marker_id],
                |row| {
                    Ok(AlertDelivery {
                        alert_id: row.get(0)?,
                        channel: row.get(1)?,
                        marker_id: row.get(2)?,
                        target_type: row.get(3)?,
                        target_number: row.get::<_, i64>(4)? as u64,
                        status: row.get(5)?,
                        attempts: row.get(6)?,
                        comment_id: row.get(7)?,
                        last_error: row.get(8)?,
                        updated_at_ms: row.get::<_, i64>(9)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(delivery)
    }

    // ---------------------------------------------------------------------
    // Loop triage
    // ---------------------------------------------------------------------

    pub fn get_triage_attempt(
        &self,
        repo: &str,
        issue_number: u64,
        signature: &str,
    ) -> Result<Option<TriageAttempt>, StoreError> {
        let conn = self.conn.lock();
        let attempt = conn
            .query_row(
                "SELECT repo, issue_number, signature, attempts, last_attempt_at_ms
                 FROM loop_triage_attempts
                 WHERE repo = ?1 AND issue_number = ?2 AND signature = ?3",
                params![repo, issue_number as i64, signature],
                row_to_triage,
            )
            .optional()?;
        Ok(attempt)
    }

    /// Increment the attempt counter, creating the row on first use.
    pub fn bump_triage_attempt(
        &self,
        repo: &str,
        issue_number: u64,
        signature: &str,
        now_ms: u64,
    ) -> Result<TriageAttempt, StoreError> {
        self.require_writable()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO loop_triage_attempts
                 (repo, issue_number, signature, attempts, last_attempt_at_ms)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT (repo, issue_number, signature) DO UPDATE SET
                 attempts = loop_triage_attempts.attempts + 1,
                 last_attempt_at_ms = excluded.last_attempt_at_ms",
            params![repo, issue_number as i64, signature, now_ms as i64],
        )?;
        let attempt = conn.query_row(
            "SELECT repo, issue_number, signature, attempts, last_attempt_at_ms
             FROM loop_triage_attempts
             WHERE repo = ?1 AND issue_number = ?2 AND signature = ?3",
            params![repo, issue_number as i64, signature],
            row_to_triage,
        )?;
        Ok(attempt)
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let input: Option<i64> = row.get(8)?;
    let output: Option<i64> = row.get(9)?;
    let reasoning: Option<i64> = row.get(10)?;
    let tokens = match (input, output, reasoning) {
        (Some(i), Some(o), Some(r)) => {
            Some(TokenTotals { input: i as u64, output: o as u64, reasoning: r as u64 })
        }
        _ => None,
    };
    Ok(RunRecord {
        id: row.get(0)?,
        repo: row.get(1)?,
        issue_number: row.get::<_, i64>(2)? as u64,
        task_ref: row.get(3)?,
        attempt_kind: row.get(4)?,
        started_at_ms: row.get::<_, i64>(5)? as u64,
        completed_at_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        outcome: row.get(7)?,
        tokens,
    })
}

fn row_to_triage(row: &rusqlite::Row<'_>) -> rusqlite::Result<TriageAttempt> {
    Ok(TriageAttempt {
        repo: row.get(0)?,
        issue_number: row.get::<_, i64>(1)? as u64,
        signature: row.get(2)?,
        attempts: row.get(3)?,
        last_attempt_at_ms: row.get::<_, i64>(4)? as u64,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
