// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only session events log.
//!
//! Raw protocol lines are appended in receive order. Writes are buffered
//! but not fsynced; the agent process itself is the source of truth, so
//! losing the tail on a crash is tolerable.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only JSONL writer for `events.jsonl`.
pub struct EventsLog {
    writer: BufWriter<File>,
}

impl EventsLog {
    /// Open (or create) the log for appending.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    /// Append one raw event line.
    pub fn append_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.trim_end_matches(['\r', '\n']).as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered lines to the OS.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for EventsLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
#[path = "events_log_tests.rs"]
mod tests;
