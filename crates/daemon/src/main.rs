// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ralphd: the orchestrator daemon.

use ralph_daemon::lifecycle::{Daemon, DaemonDeps};
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let paths = match ralph_daemon::env::control_paths() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("ralphd: {e}");
            return 1;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&paths.control_root) {
        eprintln!("ralphd: cannot create control root {}: {e}", paths.control_root.display());
        return 1;
    }

    // Log to the daemon log file; env filter via RALPH_LOG.
    let file_appender = tracing_appender::rolling::never(
        paths.daemon_log.parent().unwrap_or(&paths.control_root),
        paths
            .daemon_log
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "daemon.log".to_string()),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RALPH_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ralphd: failed to start runtime: {e}");
            return 1;
        }
    };

    runtime.block_on(async {
        let daemon = match Daemon::start(paths, DaemonDeps::production()).await {
            Ok(daemon) => daemon,
            Err(e) => {
                eprintln!("ralphd: {e}");
                return e.exit_code();
            }
        };
        println!("READY");
        match daemon.run().await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("ralphd: {e}");
                1
            }
        }
    })
}
