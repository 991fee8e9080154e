//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for driving the ralph binary against an
//! isolated control root.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// An isolated control root for one spec.
pub struct ControlRoot {
    temp: tempfile::TempDir,
}

impl ControlRoot {
    pub fn new() -> Self {
        Self { temp: tempfile::tempdir().unwrap() }
    }

    /// The control root the ralph binary will resolve.
    pub fn root(&self) -> PathBuf {
        self.temp.path().join("control")
    }

    pub fn db_path(&self) -> PathBuf {
        self.root().join("state.db")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.root().join("queue")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root().join("sessions")
    }

    pub fn control_file(&self) -> PathBuf {
        self.root().join("control.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("config.toml")
    }

    /// Write a file under the temp directory, creating parents.
    pub fn file(&self, path: impl AsRef<Path>, contents: &str) {
        let full = path.as_ref();
        let full =
            if full.is_absolute() { full.to_path_buf() } else { self.temp.path().join(full) };
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    /// A ralph invocation scoped to this control root.
    pub fn ralph(&self) -> CliBuilder {
        CliBuilder::new(self.root(), self.temp.path().to_path_buf())
    }
}

fn ralph_binary() -> PathBuf {
    assert_cmd::cargo::cargo_bin("ralph")
}

/// Fluent builder over one binary invocation.
pub struct CliBuilder {
    args: Vec<String>,
    control_root: PathBuf,
    home: PathBuf,
}

impl CliBuilder {
    fn new(control_root: PathBuf, home: PathBuf) -> Self {
        Self { args: Vec::new(), control_root, home }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn output(&self) -> Output {
        Command::new(ralph_binary())
            .args(&self.args)
            .env("HOME", &self.home)
            .env("RALPH_CONTROL_ROOT", &self.control_root)
            .env_remove("XDG_STATE_HOME")
            .env_remove("RALPH_CONFIG")
            .output()
            .unwrap()
    }

    /// Run and require exit 0.
    pub fn passes(self) -> Assertion {
        let output = self.output();
        let assertion = Assertion::new(output);
        assertion.expect_code(0)
    }

    /// Run and require a non-zero exit.
    pub fn fails(self) -> Assertion {
        let output = self.output();
        assert!(
            !output.status.success(),
            "expected failure, got exit 0\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        Assertion::new(output)
    }

    /// Run and require a specific exit code.
    pub fn exits(self, code: i32) -> Assertion {
        let output = self.output();
        Assertion::new(output).expect_code(code)
    }
}

/// Assertions over a finished invocation.
pub struct Assertion {
    output: Output,
}

impl Assertion {
    fn new(output: Output) -> Self {
        Self { output }
    }

    fn expect_code(self, expected: i32) -> Self {
        let actual = self.output.status.code();
        assert_eq!(
            actual,
            Some(expected),
            "expected exit {expected}, got {actual:?}\nstdout: {}\nstderr: {}",
            self.stdout(),
            self.stderr(),
        );
        self
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout().contains(needle),
            "stdout missing {needle:?}\nstdout: {}",
            self.stdout(),
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr().contains(needle),
            "stderr missing {needle:?}\nstderr: {}",
            self.stderr(),
        );
        self
    }

    /// Parse stdout as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap_or_else(|e| {
            panic!("stdout is not JSON: {e}\nstdout: {}", self.stdout());
        })
    }
}
