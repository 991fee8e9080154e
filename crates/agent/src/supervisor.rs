// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session supervisor run loop.
//!
//! Owns the subprocess from spawn to cleanup. Events flow stdout → events
//! log → [`SessionMonitor`]; the monitor's actions flow back as warnings,
//! nudge drains, and terminations. The loop suspends on subprocess I/O,
//! the tick timer, and the cancel channel only.

use crate::events_log::EventsLog;
use crate::nudge::NudgeQueue;
use crate::protocol::AgentEvent;
use crate::spawner::{AgentProcess, SpawnSpec, Spawner};
use crate::state::{MonitorAction, SessionMonitor, TerminationReason};
use ralph_config::{LoopConfig, SupervisorConfig};
use ralph_core::{Clock, SessionPaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Refused outright: the id could escape the sessions directory.
    #[error("unsafe session id: {0:?}")]
    UnsafeSessionId(String),

    #[error("spawn failed: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    pub fn kind(&self) -> ralph_core::ErrorKind {
        match self {
            SupervisorError::UnsafeSessionId(_) => ralph_core::ErrorKind::Safety,
            SupervisorError::Spawn(_) | SupervisorError::Io(_) => {
                ralph_core::ErrorKind::Transient
            }
        }
    }
}

/// How nudges leave the supervisor. The default delivery writes to the
/// agent's stdin; tests substitute their own.
pub enum NudgeDelivery {
    /// Write the nudge text to the subprocess stdin.
    Stdin,
    /// Never deliver (sessions that do not accept input).
    Disabled,
}

/// Outcome of one supervised session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Present when the supervisor killed the process.
    pub termination: Option<TerminationReason>,
    pub anomaly_burst: bool,
    pub pr_url: Option<String>,
    pub events_seen: u64,
    pub anomalies: u32,
    pub nudges_delivered: u32,
}

/// Supervises one agent subprocess per [`run`](Supervisor::run) call.
pub struct Supervisor<C: Clock, S: Spawner> {
    clock: C,
    spawner: S,
    supervisor_config: SupervisorConfig,
    loop_config: LoopConfig,
    sessions_dir: PathBuf,
    repo: String,
    tick: Duration,
    nudge_delivery: NudgeDelivery,
}

impl<C: Clock, S: Spawner> Supervisor<C, S> {
    pub fn new(
        clock: C,
        spawner: S,
        supervisor_config: SupervisorConfig,
        loop_config: LoopConfig,
        sessions_dir: impl Into<PathBuf>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            clock,
            spawner,
            supervisor_config,
            loop_config,
            sessions_dir: sessions_dir.into(),
            repo: repo.into(),
            tick: Duration::from_millis(250),
            nudge_delivery: NudgeDelivery::Stdin,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_nudge_delivery(mut self, delivery: NudgeDelivery) -> Self {
        self.nudge_delivery = delivery;
        self
    }

    /// Run one session to completion.
    ///
    /// `cancel` flipping to `true` (or closing) terminates the subprocess
    /// and ends the session.
    pub async fn run(
        &self,
        spec: SpawnSpec,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SessionResult, SupervisorError> {
        let paths = SessionPaths::resolve(&self.sessions_dir, &spec.session_id)
            .ok_or_else(|| SupervisorError::UnsafeSessionId(spec.session_id.clone()))?;
        std::fs::create_dir_all(&paths.dir)?;
        let mut events_log = EventsLog::open(&paths.events_log)?;
        let nudges =
            NudgeQueue::new(&paths.nudges_log, self.supervisor_config.nudge_max_attempts);

        let mut process =
            self.spawner.spawn(&spec).await.map_err(SupervisorError::Spawn)?;
        let mut monitor = SessionMonitor::new(
            self.supervisor_config.clone(),
            self.loop_config.clone(),
            self.clock.epoch_ms(),
        );
        tracing::info!(session = %spec.session_id, repo = %self.repo, "agent session started");

        let grace = Duration::from_millis(self.supervisor_config.kill_grace_ms);
        let mut termination: Option<TerminationReason> = None;
        let mut anomaly_burst = false;
        let mut events_seen: u64 = 0;
        let mut nudges_delivered: u32 = 0;
        let mut cancelled = false;

        'session: loop {
            let actions: Vec<MonitorAction> = tokio::select! {
                line = process.next_line() => {
                    match line? {
                        Some(line) => {
                            events_log.append_line(&line)?;
                            events_seen += 1;
                            let now_ms = self.clock.epoch_ms();
                            match AgentEvent::parse_line(&line) {
                                Ok(event) => monitor.on_event(&event, now_ms),
                                Err(e) => {
                                    tracing::warn!(session = %spec.session_id, error = %e, "malformed event line");
                                    monitor.on_event(&synthetic_anomaly(now_ms), now_ms)
                                }
                            }
                        }
                        None => break 'session,
                    }
                }
                _ = tokio::time::sleep(self.tick) => {
                    monitor.on_tick(self.clock.epoch_ms())
                }
                changed = cancel.changed() => {
                    let stop = match changed {
                        Ok(()) => *cancel.borrow(),
                        // Sender gone: the daemon is tearing down.
                        Err(_) => true,
                    };
                    if stop {
                        cancelled = true;
                        break 'session;
                    }
                    Vec::new()
                }
            };

            for action in actions {
                match action {
                    MonitorAction::Terminate(reason) => {
                        tracing::warn!(session = %spec.session_id, reason = ?reason, "terminating session");
                        termination = Some(reason);
                        break 'session;
                    }
                    MonitorAction::SoftWarn { tool_name } => {
                        tracing::warn!(session = %spec.session_id, tool = %tool_name, "tool past soft watchdog threshold");
                    }
                    MonitorAction::AnomalyBurst => {
                        anomaly_burst = true;
                    }
                    MonitorAction::DeliverNudges => {
                        nudges_delivered +=
                            self.drain_nudges(&nudges, process.as_mut()).await?;
                    }
                }
            }
        }

        if cancelled || termination.is_some() {
            process.terminate(grace).await?;
        }
        events_log.flush()?;
        let exit_code = process.wait().await?;
        let pr_url = monitor.best_pr_url(&self.repo);
        let success =
            !cancelled && termination.is_none() && !anomaly_burst && exit_code == Some(0);

        // Terminal cleanup: everything but the events log goes.
        paths.cleanup_preserving_events()?;
        tracing::info!(
            session = %spec.session_id,
            success,
            exit_code = ?exit_code,
            "agent session finished"
        );

        Ok(SessionResult {
            session_id: spec.session_id,
            success,
            exit_code,
            termination,
            anomaly_burst,
            pr_url,
            events_seen,
            anomalies: monitor.anomalies_total(),
            nudges_delivered,
        })
    }

    /// Sequentially deliver pending nudges; a failure stops the drain until
    /// the next checkpoint.
    async fn drain_nudges(
        &self,
        nudges: &NudgeQueue,
        process: &mut dyn AgentProcess,
    ) -> Result<u32, SupervisorError> {
        if matches!(self.nudge_delivery, NudgeDelivery::Disabled) {
            return Ok(0);
        }
        let pending = match nudges.pending() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable nudge log; skipping drain");
                return Ok(0);
            }
        };
        let mut delivered = 0;
        for nudge in pending {
            let now_ms = self.clock.epoch_ms();
            if nudge.failed_attempts >= nudges.max_attempts() {
                nudges.record_dropped(&nudge.id, now_ms).map_err(io_from_nudge)?;
                continue;
            }
            match process.send_input(&nudge.message).await {
                Ok(()) => {
                    nudges.record_success(&nudge.id, now_ms).map_err(io_from_nudge)?;
                    delivered += 1;
                }
                Err(e) => {
                    nudges
                        .record_failure(&nudge.id, now_ms, &e.to_string())
                        .map_err(io_from_nudge)?;
                    break;
                }
            }
        }
        Ok(delivered)
    }
}

fn io_from_nudge(e: crate::nudge::NudgeError) -> SupervisorError {
    match e {
        crate::nudge::NudgeError::Io(io) => SupervisorError::Io(io),
        crate::nudge::NudgeError::Json(json) => SupervisorError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            json,
        )),
    }
}

fn synthetic_anomaly(ts: u64) -> AgentEvent {
    AgentEvent {
        kind: crate::protocol::EventKind::Anomaly,
        ts,
        session_id: None,
        tool: None,
        text: None,
        pr_url: None,
        extra: Default::default(),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
