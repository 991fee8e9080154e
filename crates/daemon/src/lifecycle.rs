// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, the dispatcher loop, shutdown.
//!
//! Startup order matters: lock first (nothing is touched while a peer
//! owns the root), then the durable store, then config, then the socket.
//! Shutdown reverses it: cancel supervisors, drain, remove the record,
//! release the lock.

use crate::control::{spawn_control_watcher, ControlFile, DaemonMode};
use crate::lock::{acquire_startup_lock, LockError, StartupLock};
use crate::protocol::{RepoStatus, StatusSnapshot};
use crate::record::DaemonRecord;
use parking_lot::Mutex;
use ralph_config::Config;
use ralph_core::{ControlPaths, IdGen, SystemClock, TaskStatus, UuidIdGen};
use ralph_engine::{
    AgentRunner, DispatchGate, FakeGit, GitOps, PriorityScheduler, RealGit, RepoWorker,
    SchedulerTick, WorkerDeps,
};
use ralph_hosting::HostingClient;
use ralph_storage::{FsQueueStore, QueueStore, StateStore, StoreError};
use ralph_throttle::{AutoProfileSelector, ProfileCandidate, ThrottleEngine, ThrottleState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] ralph_config::ConfigError),

    #[error("throttle error: {0}")]
    Throttle(#[from] ralph_throttle::ThrottleError),

    #[error("failed to bind socket at {path}: {source}")]
    Bind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// Process exit code for a failed startup.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::Lock(e) => e.exit_code(),
            LifecycleError::Store(e) => e.kind().exit_code(),
            _ => 1,
        }
    }
}

/// External collaborators injected at process entry.
pub struct DaemonDeps {
    /// Hosting bindings live outside this workspace; without them the
    /// daemon supervises but never dispatches new work.
    pub host: Option<Arc<dyn HostingClient>>,
    pub runner: Option<Arc<dyn AgentRunner>>,
    /// Real git in production; tests inject a fake.
    pub git: Arc<dyn GitOps>,
}

impl DaemonDeps {
    pub fn production() -> Self {
        Self { host: None, runner: None, git: Arc::new(RealGit) }
    }

    #[allow(dead_code)]
    pub(crate) fn disconnected() -> Self {
        Self { host: None, runner: None, git: Arc::new(FakeGit::new()) }
    }
}

/// State shared with the listener.
pub struct DaemonShared {
    pub daemon_id: String,
    pub started: Instant,
    pub paths: ControlPaths,
    pub queue: Arc<FsQueueStore>,
    pub throttle: Arc<ThrottleEngine<SystemClock>>,
    pub scheduler: Mutex<PriorityScheduler>,
    pub control_rx: watch::Receiver<ControlFile>,
    pub shutdown_tx: watch::Sender<bool>,
    auto_profile: Mutex<AutoProfileSelector>,
    auto_profile_config: ralph_config::AutoProfileConfig,
}

impl DaemonShared {
    /// Build the status snapshot served over IPC.
    pub fn status(&self) -> StatusSnapshot {
        let mut by_repo: HashMap<String, RepoStatus> = HashMap::new();
        if let Ok(tasks) = self.queue.list() {
            for task in tasks {
                let entry = by_repo.entry(task.repo.clone()).or_insert_with(|| RepoStatus {
                    repo: task.repo.clone(),
                    queued: 0,
                    in_progress: 0,
                    blocked: 0,
                    done: 0,
                    escalated: 0,
                    active_sessions: 0,
                });
                match task.status {
                    TaskStatus::Queued => entry.queued += 1,
                    TaskStatus::Starting | TaskStatus::InProgress => entry.in_progress += 1,
                    TaskStatus::Blocked => entry.blocked += 1,
                    TaskStatus::Done => entry.done += 1,
                    TaskStatus::Escalated => entry.escalated += 1,
                }
            }
        }
        {
            let scheduler = self.scheduler.lock();
            for status in by_repo.values_mut() {
                status.active_sessions = scheduler.active_count(&status.repo);
            }
        }
        let mut repos: Vec<RepoStatus> = by_repo.into_values().collect();
        repos.sort_by(|a, b| a.repo.cmp(&b.repo));
        StatusSnapshot {
            daemon_id: self.daemon_id.clone(),
            pid: std::process::id(),
            mode: self.control_rx.borrow().mode.as_str().to_string(),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            repos,
            throttle: self.throttle.snapshot_all(),
        }
    }

    /// Handle a `resume` request: rewrite the control file and nudge the
    /// watcher.
    pub fn resume(&self) -> std::io::Result<()> {
        let path = self.paths.control_file();
        let mut control = ControlFile::load(&path).unwrap_or_default();
        control.mode = DaemonMode::Running;
        control.pause_requested = None;
        control.pause_at_checkpoint = None;
        control.write(&path)
    }
}

/// A started daemon, ready to run.
pub struct Daemon {
    pub shared: Arc<DaemonShared>,
    pub store: Arc<StateStore>,
    pub config: Config,
    listener: UnixListener,
    lock: StartupLock,
    record: DaemonRecord,
    workers: HashMap<String, Arc<RepoWorker<SystemClock, UuidIdGen>>>,
    host: Option<Arc<dyn HostingClient>>,
    cancel_tx: watch::Sender<bool>,
    control_handle: tokio::task::JoinHandle<()>,
}

impl Daemon {
    /// Bring the daemon up. Fails closed on lock conflicts and
    /// forward-incompatible durable state (exit code 2).
    pub async fn start(paths: ControlPaths, deps: DaemonDeps) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&paths.control_root)?;
        std::fs::create_dir_all(&paths.sessions_dir)?;
        std::fs::create_dir_all(&paths.queue_dir)?;

        let daemon_id = format!("ralphd-{}", UuidIdGen.next());
        let started_at = chrono::Utc::now().to_rfc3339();

        // 1. Lock first: nothing else is touched while a peer owns the root.
        let lock = acquire_startup_lock(&paths.lock_dir, &daemon_id, &started_at)?;

        // 2. Durable store (may refuse forward-incompatible schemas).
        let store = Arc::new(StateStore::open_writable(&paths.db_path)?);

        // 3. Configuration and throttle.
        let config = Config::load(&crate::env::config_path(&paths))?;
        let throttle = Arc::new(ThrottleEngine::new(
            SystemClock,
            config.throttle.clone(),
            config.profiles.clone().into_iter().collect(),
        )?);

        // 4. Control watcher.
        let (control_rx, control_handle) =
            spawn_control_watcher(paths.control_file(), Duration::from_millis(1_000));

        // 5. Daemon record.
        let record = DaemonRecord::for_current_process(
            &daemon_id,
            &started_at,
            &paths.control_root,
            &paths.control_file(),
        );
        record.write(&paths.daemon_registry)?;

        // 6. Socket last, after all validation passed.
        if paths.socket_path.exists() {
            std::fs::remove_file(&paths.socket_path)?;
        }
        let listener = UnixListener::bind(&paths.socket_path)
            .map_err(|e| LifecycleError::Bind { path: paths.socket_path.clone(), source: e })?;

        // 7. Scheduler and workers.
        let mut scheduler = PriorityScheduler::new();
        scheduler.set_repos(
            config
                .repos
                .iter()
                .map(|(repo, rc)| (repo.clone(), rc.priority_band(), rc.slots()))
                .collect(),
        );
        let queue = Arc::new(FsQueueStore::new(&paths.queue_dir));
        let (cancel_tx, _cancel_rx) = watch::channel(false);

        let mut workers = HashMap::new();
        if let Some(host) = &deps.host {
            let default_profile = control_rx.borrow().default_profile.clone();
            for (repo, repo_config) in &config.repos {
                let runner: Arc<dyn AgentRunner> = match &deps.runner {
                    Some(runner) => Arc::clone(runner),
                    None => Arc::new(crate::runner::SupervisorRunner::new(
                        paths.sessions_dir.clone(),
                        repo.clone(),
                        crate::runner::default_agent_command(),
                        profile_data_dir(&config, default_profile.as_deref()),
                        config.clone(),
                        cancel_tx.subscribe(),
                    )),
                };
                let worker_deps = WorkerDeps {
                    store: Arc::clone(&store),
                    queue: Arc::clone(&queue) as Arc<dyn QueueStore>,
                    host: Arc::clone(host),
                    git: Arc::clone(&deps.git),
                    runner,
                };
                let throttle_for_checkpoint = Arc::clone(&throttle);
                let profile_names: Vec<String> = config.profiles.keys().cloned().collect();
                let worker = RepoWorker::new(
                    repo.clone(),
                    repo_config.clone(),
                    worker_deps,
                    SystemClock,
                    UuidIdGen,
                )
                .with_throttle_checkpoint(Arc::new(move || {
                    profile_names.iter().any(|p| {
                        matches!(
                            throttle_for_checkpoint.check(p),
                            Ok(d) if d.state == ThrottleState::Hard
                        )
                    })
                }));
                workers.insert(repo.clone(), Arc::new(worker));
            }
        } else {
            tracing::warn!("no hosting bindings registered; dispatch is disabled");
        }

        let (shutdown_tx, _) = watch::channel(false);
        let shared = Arc::new(DaemonShared {
            daemon_id,
            started: Instant::now(),
            paths,
            queue,
            throttle,
            scheduler: Mutex::new(scheduler),
            control_rx,
            shutdown_tx,
            auto_profile: Mutex::new(AutoProfileSelector::new()),
            auto_profile_config: config.throttle.auto_profile.clone(),
        });

        tracing::info!(daemon = %shared.daemon_id, "daemon started");
        Ok(Self {
            shared,
            store,
            config,
            listener,
            lock,
            record,
            workers,
            host: deps.host,
            cancel_tx,
            control_handle,
        })
    }

    /// Run until a shutdown signal (SIGTERM/SIGINT, IPC shutdown, or drain
    /// completion).
    pub async fn run(self) -> Result<(), LifecycleError> {
        let Daemon {
            shared,
            store,
            config,
            listener,
            lock,
            mut record,
            workers,
            host,
            cancel_tx,
            control_handle,
        } = self;

        let listener_shared = Arc::clone(&shared);
        let listener_handle =
            tokio::spawn(async move { crate::listener::serve(listener, listener_shared).await });

        let mut shutdown_rx = shared.shutdown_tx.subscribe();
        let mut control_rx = shared.control_rx.clone();
        let mut ticks: JoinSet<(String, ())> = JoinSet::new();
        let mut interval = tokio::time::interval(Duration::from_millis(1_000));
        let mut heartbeat_counter = 0u32;

        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("SIGINT received; shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("SIGTERM received; shutting down");
                    break;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("shutdown requested over IPC");
                        break;
                    }
                }
                _ = control_rx.changed() => {
                    // Mode changes take effect at the next tick; nothing to
                    // do here beyond logging, which the watcher already did.
                }
                Some(finished) = ticks.join_next(), if !ticks.is_empty() => {
                    if let Ok((repo, ())) = finished {
                        shared.scheduler.lock().release_slot(&repo);
                    }
                }
                _ = interval.tick() => {
                    heartbeat_counter += 1;
                    if heartbeat_counter % 30 == 0 {
                        let now = chrono::Utc::now().to_rfc3339();
                        let _ = record.heartbeat(&shared.paths.daemon_registry, &now);
                    }
                    if let Some(host) = &host {
                        // Slow passes: autopilot each minute, parity audit
                        // every ten.
                        if heartbeat_counter % 60 == 0 {
                            spawn_maintenance(
                                Arc::clone(host),
                                Arc::clone(&store),
                                Arc::clone(&shared.queue),
                                config.clone(),
                                heartbeat_counter % 600 == 0,
                            );
                        }
                    }
                    dispatch(&shared, &workers, &mut ticks);
                }
            }
        }

        // Drain: cancel supervisors, give in-flight ticks a bounded window.
        let drain_timeout = shared.control_rx.borrow().drain_timeout();
        let _ = cancel_tx.send(true);
        let drain = async {
            while ticks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            tracing::warn!("drain timeout elapsed; abandoning in-flight ticks");
            ticks.abort_all();
        }

        listener_handle.abort();
        control_handle.abort();
        DaemonRecord::remove(&shared.paths.daemon_registry);
        if shared.paths.socket_path.exists() {
            let _ = std::fs::remove_file(&shared.paths.socket_path);
        }
        lock.release();
        tracing::info!("daemon shutdown complete");
        Ok(())
    }
}

/// Background maintenance: the autopilot pass, plus the queue parity
/// audit when `with_audit` is set.
fn spawn_maintenance(
    host: Arc<dyn HostingClient>,
    store: Arc<StateStore>,
    queue: Arc<FsQueueStore>,
    config: Config,
    with_audit: bool,
) {
    tokio::spawn(async move {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        for repo in config.repos.keys() {
            match ralph_engine::autopilot_tick(
                host.as_ref(),
                store.as_ref(),
                queue.as_ref(),
                &config.autopilot,
                repo,
                now_ms,
            )
            .await
            {
                Ok(0) => {}
                Ok(applied) => tracing::info!(repo, applied, "autopilot resolutions applied"),
                Err(e) => tracing::warn!(repo, error = %e, "autopilot pass failed"),
            }
            if with_audit {
                if let Err(e) =
                    ralph_engine::audit_queue_parity(host.as_ref(), queue.as_ref(), repo).await
                {
                    tracing::warn!(repo, error = %e, "queue parity audit failed");
                }
            }
        }
    });
}

/// One dispatcher pass: apply the gates, pick a repo, spawn its tick.
fn dispatch(
    shared: &Arc<DaemonShared>,
    workers: &HashMap<String, Arc<RepoWorker<SystemClock, UuidIdGen>>>,
    ticks: &mut JoinSet<(String, ())>,
) {
    let control = shared.control_rx.borrow().clone();
    let throttle_state = effective_throttle_state(shared, control.default_profile.as_deref());
    let gate = DispatchGate::evaluate(control.mode.as_str(), throttle_state);
    if !gate.allows_new_work() {
        return;
    }
    let repo = {
        let queued: std::collections::HashSet<String> = match shared.queue.list() {
            Ok(tasks) => tasks
                .into_iter()
                .filter(|t| t.status == TaskStatus::Queued)
                .map(|t| t.repo)
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "queue unreadable; skipping dispatch");
                return;
            }
        };
        let mut scheduler = shared.scheduler.lock();
        match scheduler.next(&|repo| queued.contains(repo)) {
            SchedulerTick::Dispatch { repo } => {
                if !scheduler.acquire_slot(&repo) {
                    return;
                }
                repo
            }
            SchedulerTick::Idle => return,
        }
    };
    let Some(worker) = workers.get(&repo).cloned() else {
        shared.scheduler.lock().release_slot(&repo);
        return;
    };
    ticks.spawn(async move {
        match worker.tick().await {
            Ok(outcome) => {
                tracing::debug!(repo = %worker.repo(), outcome = ?outcome, "tick finished")
            }
            Err(e) => tracing::warn!(repo = %worker.repo(), error = %e, "tick failed"),
        }
        (worker.repo().to_string(), ())
    });
}

/// Data directory for the agent: the preferred profile when configured,
/// else the first profile, else a scratch directory.
fn profile_data_dir(config: &Config, preferred: Option<&str>) -> std::path::PathBuf {
    preferred
        .and_then(|name| config.profiles.get(name))
        .or_else(|| config.profiles.values().next())
        .map(|p| p.data_dir.clone())
        .unwrap_or_else(std::env::temp_dir)
}

/// Throttle state for the dispatch gate: the configured default profile
/// when set, else the auto-selected profile (prefer-sooner-reset), else
/// the worst state across profiles.
fn effective_throttle_state(
    shared: &DaemonShared,
    default_profile: Option<&str>,
) -> ThrottleState {
    if let Some(profile) = default_profile {
        return shared
            .throttle
            .check(profile)
            .map(|d| d.state)
            .unwrap_or(ThrottleState::Ok);
    }
    let decisions = shared.throttle.snapshot_all();
    if decisions.is_empty() {
        return ThrottleState::Ok;
    }
    let candidates: Vec<ProfileCandidate> = decisions
        .iter()
        .map(|d| ProfileCandidate { name: d.profile.clone(), decision: d.clone() })
        .collect();
    let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let selected = shared
        .auto_profile
        .lock()
        .select(&candidates, now_ms, &shared.auto_profile_config);
    match selected {
        Some(name) => decisions
            .iter()
            .find(|d| d.profile == name)
            .map(|d| d.state)
            .unwrap_or(ThrottleState::Ok),
        // Every profile is depleted: the worst state gates dispatch.
        None => decisions.into_iter().map(|d| d.state).max().unwrap_or(ThrottleState::Ok),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
