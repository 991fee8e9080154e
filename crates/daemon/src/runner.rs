// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production [`AgentRunner`]: drives the real agent binary through the
//! supervisor.
//!
//! Advisory reviews run the same binary with a per-gate prompt; the review
//! text is recovered from the session's events log (`message` events) after
//! the run.

use async_trait::async_trait;
use ralph_agent::{
    AgentEvent, EventKind, NudgeDelivery, SessionResult, SpawnSpec, Supervisor, TokioSpawner,
};
use ralph_config::Config;
use ralph_core::{SessionPaths, SystemClock, TaskRecord};
use ralph_engine::{AgentRunner, EngineError, ReviewOutcome};
use ralph_storage::{Gate, TokenTotals};
use std::path::PathBuf;
use tokio::sync::watch;

/// Runs the configured agent binary under supervision.
pub struct SupervisorRunner {
    sessions_dir: PathBuf,
    repo: String,
    agent_command: String,
    data_dir: PathBuf,
    config: Config,
    cancel: watch::Receiver<bool>,
}

impl SupervisorRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions_dir: PathBuf,
        repo: String,
        agent_command: String,
        data_dir: PathBuf,
        config: Config,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self { sessions_dir, repo, agent_command, data_dir, config, cancel }
    }

    fn supervisor(&self) -> Supervisor<SystemClock, TokioSpawner> {
        Supervisor::new(
            SystemClock,
            TokioSpawner,
            self.config.supervisor.clone(),
            self.config.loop_detection.clone(),
            self.sessions_dir.clone(),
            self.repo.clone(),
        )
    }

    fn spawn_spec(&self, task: &TaskRecord, session_id: &str, prompt_kind: &str) -> SpawnSpec {
        let cwd = if task.worktree_path.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&task.worktree_path)
        };
        SpawnSpec {
            session_id: session_id.to_string(),
            command: self.agent_command.clone(),
            args: vec![
                "--task".to_string(),
                task.issue.clone(),
                "--mode".to_string(),
                prompt_kind.to_string(),
            ],
            env: vec![
                ("AGENT_DATA_DIR".to_string(), self.data_dir.display().to_string()),
                // Lock the agent's config dir to the session directory so
                // concurrent sessions never share mutable state.
                (
                    "AGENT_CONFIG_DIR".to_string(),
                    self.sessions_dir.join(session_id).display().to_string(),
                ),
            ],
            cwd,
            stderr_log: SessionPaths::resolve(&self.sessions_dir, session_id)
                .map(|p| p.dir.join("run.log")),
        }
    }

    /// Concatenated assistant text from a session's events log.
    fn review_text(&self, session_id: &str) -> String {
        let Some(paths) = SessionPaths::resolve(&self.sessions_dir, session_id) else {
            return String::new();
        };
        let Ok(content) = std::fs::read_to_string(&paths.events_log) else {
            return String::new();
        };
        let mut text = String::new();
        for line in content.lines() {
            if let Ok(event) = AgentEvent::parse_line(line) {
                if event.kind == EventKind::Message {
                    if let Some(t) = &event.text {
                        text.push_str(t);
                        text.push('\n');
                    }
                }
            }
        }
        text
    }
}

#[async_trait]
impl AgentRunner for SupervisorRunner {
    async fn review(&self, task: &TaskRecord, gate: Gate) -> Result<ReviewOutcome, EngineError> {
        let session_id = format!("{}-{}", task.session_id, gate.as_str()).replace('_', "-");
        let spec = self.spawn_spec(task, &session_id, gate.as_str());
        let supervisor = self.supervisor().with_nudge_delivery(NudgeDelivery::Disabled);
        let result = supervisor.run(spec, self.cancel.clone()).await?;
        let text = self.review_text(&result.session_id);
        Ok(ReviewOutcome { text })
    }

    async fn implement(
        &self,
        task: &TaskRecord,
        session_id: &str,
    ) -> Result<(SessionResult, Option<TokenTotals>), EngineError> {
        let spec = self.spawn_spec(task, session_id, "implement");
        let result = self.supervisor().run(spec, self.cancel.clone()).await?;
        // Token totals come from the throttle's message-store scan, not the
        // session stream; runs record them only when the agent reports them.
        Ok((result, None))
    }
}

/// Default agent command when the profile does not name one.
pub fn default_agent_command() -> String {
    std::env::var("RALPH_AGENT_BIN").unwrap_or_else(|_| "coding-agent".to_string())
}
