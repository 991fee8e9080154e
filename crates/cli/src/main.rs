// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph - orchestrator CLI

mod client;
mod exit_error;
mod gates;
mod nudge;
mod repos;
mod resume;
mod status;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ralph", version, about = "Autonomous multi-repo coding-agent orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon liveness, mode, throttle state, and per-repo task counts
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Gate state for the latest run of an issue
    Gates {
        /// Repository slug (<owner>/<name>)
        repo: String,
        /// Issue number
        issue: u64,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Re-render status on an interval
    Watch {
        /// Refresh interval in seconds
        #[arg(long, default_value = "2")]
        interval: u64,
    },
    /// Queue a message for an in-flight task's next safe checkpoint
    Nudge {
        /// Task path or issue reference (<owner>/<name>#<n>)
        task_ref: String,
        /// The message to deliver
        message: String,
    },
    /// Clear pause state and return the daemon to running
    Resume,
    /// Configured repositories and their scheduling knobs
    Repos {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<ExitError>().map_or(1, |c| c.code);
        let msg = e.to_string();
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    // Usage errors exit 1; code 2 is reserved for forward-incompatible
    // state and single-instance refusal.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    let paths = ralph_daemon::env::control_paths()
        .map_err(|e| ExitError::new(1, e.to_string()))?;

    match cli.command {
        Commands::Status { json } => status::handle(&paths, json).await?,
        Commands::Gates { repo, issue, json } => {
            let (value, exit_code) = gates::collect_gates(&paths.db_path, &repo, issue);
            if json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", gates::render_text(&value));
            }
            if exit_code != 0 {
                // The envelope already went to stdout; exit silently.
                return Err(ExitError::new(exit_code, String::new()).into());
            }
        }
        Commands::Watch { interval } => {
            watch::handle(&paths, Duration::from_secs(interval.max(1))).await?
        }
        Commands::Nudge { task_ref, message } => nudge::handle(&paths, &task_ref, &message)?,
        Commands::Resume => resume::handle(&paths).await?,
        Commands::Repos { json } => {
            let config_path = ralph_daemon::env::config_path(&paths);
            repos::handle(&config_path, json)?
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
