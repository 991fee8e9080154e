// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent process spawning.
//!
//! The [`Spawner`] capability hides the real subprocess behind a trait so
//! the supervisor's policy can be driven by a scripted fake in tests.
//! Production uses [`TokioSpawner`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Everything needed to start one agent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Safe session id; becomes the session directory name.
    pub session_id: String,
    /// Program to execute.
    pub command: String,
    pub args: Vec<String>,
    /// Injected environment (profile data dir, locked config dirs).
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    /// Where to capture stderr (the run log). Never parsed.
    pub stderr_log: Option<PathBuf>,
}

/// A running agent subprocess.
#[async_trait]
pub trait AgentProcess: Send {
    /// Next stdout line, or `None` at EOF.
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;

    /// Write a line to the agent's stdin (nudge delivery).
    async fn send_input(&mut self, text: &str) -> std::io::Result<()>;

    /// SIGTERM, wait up to `grace`, then SIGKILL.
    async fn terminate(&mut self, grace: Duration) -> std::io::Result<()>;

    /// Wait for exit; `None` when killed by signal.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;
}

/// Spawns agent processes.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, spec: &SpawnSpec) -> std::io::Result<Box<dyn AgentProcess>>;
}

/// Real subprocess spawner.
#[derive(Clone, Default)]
pub struct TokioSpawner;

struct TokioProcess {
    child: Child,
    stdout: tokio::io::Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl Spawner for TokioSpawner {
    async fn spawn(&self, spec: &SpawnSpec) -> std::io::Result<Box<dyn AgentProcess>> {
        let stderr = match &spec.stderr_log {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
                std::process::Stdio::from(file)
            }
            None => std::process::Stdio::null(),
        };
        let mut child = tokio::process::Command::new(&spec.command)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&spec.cwd)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "no stdout pipe")
        })?;
        let stdin = child.stdin.take();
        Ok(Box::new(TokioProcess {
            child,
            stdout: BufReader::new(stdout).lines(),
            stdin,
        }))
    }
}

#[async_trait]
impl AgentProcess for TokioProcess {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.stdout.next_line().await
    }

    async fn send_input(&mut self, text: &str) -> std::io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed")
        })?;
        stdin.write_all(text.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }

    async fn terminate(&mut self, grace: Duration) -> std::io::Result<()> {
        if let Some(pid) = self.child.id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.child.start_kill()?;
                let _ = self.child.wait().await;
                Ok(())
            }
        }
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}

// ---------------------------------------------------------------------
// Fake spawner (tests)
// ---------------------------------------------------------------------

/// One scripted stdout step for a [`FakeProcess`].
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum ScriptedLine {
    /// Emit this stdout line.
    Line(String),
    /// Pretend the agent is silently busy for this long.
    Pause(Duration),
}

/// Scripted in-memory agent process.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeProcess {
    script: std::collections::VecDeque<ScriptedLine>,
    /// Pend forever after the script instead of returning EOF.
    hang_at_end: bool,
    exit_code: Option<i32>,
    inputs: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
    terminated: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeProcess {
    pub fn scripted(lines: impl IntoIterator<Item = ScriptedLine>) -> Self {
        Self {
            script: lines.into_iter().collect(),
            hang_at_end: false,
            exit_code: Some(0),
            inputs: std::sync::Arc::new(parking_lot::Mutex::new(Vec::new())),
            terminated: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn hanging(lines: impl IntoIterator<Item = ScriptedLine>) -> Self {
        let mut process = Self::scripted(lines);
        process.hang_at_end = true;
        process.exit_code = None;
        process
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Handles to observe the process from the outside.
    pub fn probes(
        &self,
    ) -> (
        std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
        std::sync::Arc<std::sync::atomic::AtomicBool>,
    ) {
        (std::sync::Arc::clone(&self.inputs), std::sync::Arc::clone(&self.terminated))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentProcess for FakeProcess {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if self.terminated.load(std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            match self.script.pop_front() {
                Some(ScriptedLine::Line(line)) => return Ok(Some(line)),
                Some(ScriptedLine::Pause(duration)) => {
                    tokio::time::sleep(duration).await;
                }
                None => {
                    if self.hang_at_end {
                        // Stay silent until terminated.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn send_input(&mut self, text: &str) -> std::io::Result<()> {
        self.inputs.lock().push(text.to_string());
        Ok(())
    }

    async fn terminate(&mut self, _grace: Duration) -> std::io::Result<()> {
        self.terminated.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        if self.terminated.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.exit_code)
    }
}

/// Hands out pre-built fake processes and records the specs it saw.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeSpawner {
    processes: parking_lot::Mutex<std::collections::VecDeque<FakeProcess>>,
    specs: parking_lot::Mutex<Vec<SpawnSpec>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, process: FakeProcess) {
        self.processes.lock().push_back(process);
    }

    pub fn specs(&self) -> Vec<SpawnSpec> {
        self.specs.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Spawner for FakeSpawner {
    async fn spawn(&self, spec: &SpawnSpec) -> std::io::Result<Box<dyn AgentProcess>> {
        self.specs.lock().push(spec.clone());
        let process = self.processes.lock().pop_front().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted process")
        })?;
        Ok(Box::new(process))
    }
}
