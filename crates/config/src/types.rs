// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration types and loading.

use ralph_core::PriorityBand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {key}: {message}")]
    Validation { key: String, message: String },
}

impl ConfigError {
    fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { key: key.into(), message: message.into() }
    }
}

/// Per-repository settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Local checkout of the repository (never worked in directly).
    pub root: PathBuf,
    /// Priority band 0–3 (higher bands earn more scheduler turns).
    #[serde(default)]
    pub priority: u8,
    /// Concurrent tasks allowed for this repo.
    #[serde(default)]
    pub concurrency_slots: Option<u32>,
    /// Legacy alias consulted when `concurrency_slots` is absent.
    #[serde(default)]
    pub max_workers: Option<u32>,
    /// Integration branch owned by the bot; PRs base here.
    #[serde(default = "default_bot_branch")]
    pub bot_branch: String,
    /// The repository's default branch (never deleted, never pushed to).
    #[serde(default = "default_default_branch")]
    pub default_branch: String,
    /// Directory for task worktrees; defaults to `<root>-worktrees`.
    #[serde(default)]
    pub worktrees_dir: Option<PathBuf>,
}

fn default_bot_branch() -> String {
    "bot/integration".to_string()
}

fn default_default_branch() -> String {
    "main".to_string()
}

impl RepoConfig {
    /// Effective concurrency slots: `concurrency_slots → max_workers → 1`.
    pub fn slots(&self) -> u32 {
        self.concurrency_slots.or(self.max_workers).unwrap_or(1).max(1)
    }

    pub fn priority_band(&self) -> PriorityBand {
        PriorityBand::clamped(self.priority)
    }

    /// Where this repo's worktrees are created.
    pub fn worktrees_dir(&self) -> PathBuf {
        self.worktrees_dir.clone().unwrap_or_else(|| {
            let mut dir = self.root.as_os_str().to_os_string();
            dir.push("-worktrees");
            PathBuf::from(dir)
        })
    }
}

/// A named agent configuration selecting a data directory and budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// The coding agent's on-disk data directory (message store lives here).
    pub data_dir: PathBuf,
    /// Provider id whose assistant messages count against the budgets.
    pub provider_id: String,
    /// Token budget for the rolling 5-hour window.
    pub budget_5h: u64,
    /// Token budget for the calendar week.
    pub budget_weekly: u64,
    /// Soft-cap fraction of each budget.
    #[serde(default = "default_soft_pct")]
    pub soft_pct: f64,
    /// Hard-cap fraction of each budget.
    #[serde(default = "default_hard_pct")]
    pub hard_pct: f64,
}

fn default_soft_pct() -> f64 {
    0.8
}

fn default_hard_pct() -> f64 {
    0.95
}

/// Weekly throttle reset boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeeklyReset {
    /// Day name, lowercase ("monday".."sunday").
    #[serde(default = "default_reset_day")]
    pub day_of_week: String,
    #[serde(default)]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    /// IANA zone name; empty means the system-local zone fixed at process
    /// start.
    #[serde(default)]
    pub time_zone: String,
}

fn default_reset_day() -> String {
    "monday".to_string()
}

impl Default for WeeklyReset {
    fn default() -> Self {
        Self {
            day_of_week: default_reset_day(),
            hour: 0,
            minute: 0,
            time_zone: String::new(),
        }
    }
}

const DAY_NAMES: [&str; 7] =
    ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

impl WeeklyReset {
    /// Day index with Monday = 0.
    pub fn day_index(&self) -> Option<u8> {
        DAY_NAMES.iter().position(|d| *d == self.day_of_week).map(|i| i as u8)
    }
}

/// Auto-profile selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoProfileConfig {
    /// Do not chase a profile whose weekly remainder is below this fraction.
    #[serde(default = "default_min_remaining_fraction")]
    pub min_remaining_fraction: f64,
    /// Minimum interval between profile switches.
    #[serde(default = "default_min_switch_interval_ms")]
    pub min_switch_interval_ms: u64,
}

fn default_min_remaining_fraction() -> f64 {
    0.15
}

fn default_min_switch_interval_ms() -> u64 {
    300_000
}

impl Default for AutoProfileConfig {
    fn default() -> Self {
        Self {
            min_remaining_fraction: default_min_remaining_fraction(),
            min_switch_interval_ms: default_min_switch_interval_ms(),
        }
    }
}

/// Throttle engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// Re-scan the message store at most this often.
    #[serde(default = "default_min_check_interval_ms")]
    pub min_check_interval_ms: u64,
    #[serde(default)]
    pub weekly_reset: WeeklyReset,
    #[serde(default)]
    pub auto_profile: AutoProfileConfig,
}

fn default_min_check_interval_ms() -> u64 {
    60_000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_check_interval_ms: default_min_check_interval_ms(),
            weekly_reset: WeeklyReset::default(),
            auto_profile: AutoProfileConfig::default(),
        }
    }
}

/// Soft/hard watchdog durations for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogDurations {
    pub soft_ms: u64,
    pub hard_ms: u64,
}

/// Agent supervision thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Per-tool watchdog overrides; tools not listed use the defaults.
    #[serde(default)]
    pub watchdog: BTreeMap<String, WatchdogDurations>,
    /// Kill a session after this long with no events at all.
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
    /// Drop a nudge after this many failed deliveries.
    #[serde(default = "default_nudge_max_attempts")]
    pub nudge_max_attempts: u32,
    /// Anomaly burst: this many anomalies within the window trips the burst
    /// signal.
    #[serde(default = "default_anomaly_burst_count")]
    pub anomaly_burst_count: u32,
    #[serde(default = "default_anomaly_burst_window_ms")]
    pub anomaly_burst_window_ms: u64,
    /// Cumulative anomaly count that trips the burst signal outright.
    #[serde(default = "default_anomaly_cumulative_limit")]
    pub anomaly_cumulative_limit: u32,
    /// SIGTERM-to-SIGKILL grace when terminating a session.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_stall_timeout_ms() -> u64 {
    600_000
}

fn default_nudge_max_attempts() -> u32 {
    3
}

fn default_anomaly_burst_count() -> u32 {
    20
}

fn default_anomaly_burst_window_ms() -> u64 {
    10_000
}

fn default_anomaly_cumulative_limit() -> u32 {
    50
}

fn default_kill_grace_ms() -> u64 {
    5_000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            watchdog: BTreeMap::new(),
            stall_timeout_ms: default_stall_timeout_ms(),
            nudge_max_attempts: default_nudge_max_attempts(),
            anomaly_burst_count: default_anomaly_burst_count(),
            anomaly_burst_window_ms: default_anomaly_burst_window_ms(),
            anomaly_cumulative_limit: default_anomaly_cumulative_limit(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

impl SupervisorConfig {
    /// Watchdog durations for a tool. `bash` gets the longest defaults;
    /// anything else a tighter pair.
    pub fn watchdog_for(&self, tool: &str) -> WatchdogDurations {
        if let Some(d) = self.watchdog.get(tool) {
            return *d;
        }
        if tool == "bash" {
            WatchdogDurations { soft_ms: 300_000, hard_ms: 900_000 }
        } else {
            WatchdogDurations { soft_ms: 60_000, hard_ms: 180_000 }
        }
    }
}

/// Loop-detector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    #[serde(default = "default_min_edits")]
    pub min_edits: u32,
    #[serde(default = "default_min_elapsed_ms_without_gate")]
    pub min_elapsed_ms_without_gate: u64,
    #[serde(default = "default_min_top_file_touches")]
    pub min_top_file_touches: u32,
    #[serde(default = "default_min_top_file_share")]
    pub min_top_file_share: f64,
    /// Bash commands that count as a gate (reset the edit window).
    #[serde(default = "default_gate_commands")]
    pub gate_commands: Vec<String>,
}

fn default_min_edits() -> u32 {
    8
}

fn default_min_elapsed_ms_without_gate() -> u64 {
    900_000
}

fn default_min_top_file_touches() -> u32 {
    4
}

fn default_min_top_file_share() -> f64 {
    0.5
}

fn default_gate_commands() -> Vec<String> {
    ["cargo test", "cargo check", "npm test", "pytest", "git commit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_edits: default_min_edits(),
            min_elapsed_ms_without_gate: default_min_elapsed_ms_without_gate(),
            min_top_file_touches: default_min_top_file_touches(),
            min_top_file_share: default_min_top_file_share(),
            gate_commands: default_gate_commands(),
        }
    }
}

/// Escalation-autopilot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutopilotConfig {
    #[serde(default = "default_max_attempts_per_signature")]
    pub max_attempts_per_signature: u32,
}

fn default_max_attempts_per_signature() -> u32 {
    2
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self { max_attempts_per_signature: default_max_attempts_per_signature() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub loop_detection: LoopConfig,
    #[serde(default)]
    pub autopilot: AutopilotConfig,
}

impl Config {
    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
        };
        let config: Config = toml::from_str(&text)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (slug, repo) in &self.repos {
            if !slug.contains('/') {
                return Err(ConfigError::validation(
                    format!("repos.{}", slug),
                    "repo key must be <owner>/<name>",
                ));
            }
            if repo.priority > PriorityBand::MAX {
                return Err(ConfigError::validation(
                    format!("repos.{}.priority", slug),
                    format!("priority must be 0..={}", PriorityBand::MAX),
                ));
            }
            if repo.bot_branch == repo.default_branch {
                return Err(ConfigError::validation(
                    format!("repos.{}.bot_branch", slug),
                    "bot branch must differ from the default branch",
                ));
            }
        }
        for (name, profile) in &self.profiles {
            if !(0.0..=1.0).contains(&profile.soft_pct)
                || !(0.0..=1.0).contains(&profile.hard_pct)
            {
                return Err(ConfigError::validation(
                    format!("profiles.{}", name),
                    "soft_pct and hard_pct must be within 0..=1",
                ));
            }
            if profile.soft_pct > profile.hard_pct {
                return Err(ConfigError::validation(
                    format!("profiles.{}.soft_pct", name),
                    "soft_pct must not exceed hard_pct",
                ));
            }
        }
        let reset = &self.throttle.weekly_reset;
        if reset.day_index().is_none() {
            return Err(ConfigError::validation(
                "throttle.weekly_reset.day_of_week",
                format!("unknown day name {:?}", reset.day_of_week),
            ));
        }
        if reset.hour > 23 || reset.minute > 59 {
            return Err(ConfigError::validation(
                "throttle.weekly_reset",
                "hour must be 0..=23 and minute 0..=59",
            ));
        }
        if self.loop_detection.min_top_file_share <= 0.0
            || self.loop_detection.min_top_file_share > 1.0
        {
            return Err(ConfigError::validation(
                "loop_detection.min_top_file_share",
                "share must be within (0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
