// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `watch` command: a plain re-render loop over `status`.

use crate::status;
use ralph_core::ControlPaths;
use std::time::Duration;

pub async fn handle(paths: &ControlPaths, interval: Duration) -> anyhow::Result<()> {
    loop {
        let report = status::collect(paths).await?;
        // Clear screen and home the cursor between frames.
        print!("\x1b[2J\x1b[H{}", status::render_text(&report));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
        }
    }
}
