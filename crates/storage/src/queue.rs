// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue backend: persistent task records with optimistic updates.
//!
//! One JSON file per task under the queue directory, written atomically.
//! Status changes go through [`QueueStore::transition`], which enforces the
//! status graph and the record invariants; a concurrent writer is detected
//! by comparing the on-disk status to the caller's expectation.

#[cfg(any(test, feature = "test-support"))]
use parking_lot::Mutex;
use ralph_core::{write_atomic, TaskRecord, TaskStatus};
#[cfg(any(test, feature = "test-support"))]
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Queue backend errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {path} changed underneath us (expected {expected}, found {actual})")]
    Conflict { path: String, expected: TaskStatus, actual: TaskStatus },

    #[error("illegal transition for {path}: {from} → {to}")]
    InvalidTransition { path: String, from: TaskStatus, to: TaskStatus },

    #[error("task invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task file parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent list of tasks.
///
/// Implementations must apply `update` atomically with respect to other
/// callers of the same store.
pub trait QueueStore: Send + Sync {
    /// All task records, in stable (path) order.
    fn list(&self) -> Result<Vec<TaskRecord>, QueueError>;

    /// One task by its stable path id.
    fn get(&self, path: &str) -> Result<TaskRecord, QueueError>;

    /// Create a task record; refuses to overwrite.
    fn put(&self, task: &TaskRecord) -> Result<(), QueueError>;

    /// Replace a record, verifying the stored status still matches
    /// `expected_status` (optimistic concurrency).
    fn update(&self, task: &TaskRecord, expected_status: TaskStatus) -> Result<(), QueueError>;

    /// Transition a task through the status graph.
    ///
    /// Loads the record, verifies it is still in `from`, applies `mutate`,
    /// sets the status to `to`, checks invariants, and stores the result.
    fn transition(
        &self,
        path: &str,
        from: TaskStatus,
        to: TaskStatus,
        mutate: &mut dyn FnMut(&mut TaskRecord),
    ) -> Result<TaskRecord, QueueError> {
        if !TaskStatus::can_transition(from, to) {
            return Err(QueueError::InvalidTransition { path: path.to_string(), from, to });
        }
        let mut task = self.get(path)?;
        if task.status != from {
            return Err(QueueError::Conflict {
                path: path.to_string(),
                expected: from,
                actual: task.status,
            });
        }
        mutate(&mut task);
        task.status = to;
        if to.is_terminal() || to == TaskStatus::Queued {
            task.clear_session_fields();
        }
        task.check_invariants().map_err(QueueError::Invariant)?;
        self.update(&task, from)?;
        Ok(task)
    }
}

/// Filesystem queue store: `<queue_dir>/<slug>.json` per task.
pub struct FsQueueStore {
    queue_dir: PathBuf,
}

impl FsQueueStore {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self { queue_dir: queue_dir.into() }
    }

    /// File name for a task path: path separators flattened, everything
    /// else restricted to safe characters.
    fn file_for(&self, task_path: &str) -> PathBuf {
        let slug: String = task_path
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.queue_dir.join(format!("{slug}.json"))
    }

    fn read_file(&self, file: &Path, task_path: &str) -> Result<TaskRecord, QueueError> {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueueError::NotFound(task_path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

impl QueueStore for FsQueueStore {
    fn list(&self) -> Result<Vec<TaskRecord>, QueueError> {
        let entries = match std::fs::read_dir(&self.queue_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut tasks = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_file(&path, &path.display().to_string()) {
                Ok(task) => tasks.push(task),
                Err(QueueError::Json(e)) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable task file");
                }
                Err(e) => return Err(e),
            }
        }
        tasks.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(tasks)
    }

    fn get(&self, path: &str) -> Result<TaskRecord, QueueError> {
        self.read_file(&self.file_for(path), path)
    }

    fn put(&self, task: &TaskRecord) -> Result<(), QueueError> {
        let file = self.file_for(&task.path);
        if file.exists() {
            return Err(QueueError::Invariant(format!("task already exists: {}", task.path)));
        }
        let text = serde_json::to_vec_pretty(task)?;
        write_atomic(&file, &text)?;
        Ok(())
    }

    fn update(&self, task: &TaskRecord, expected_status: TaskStatus) -> Result<(), QueueError> {
        let stored = self.get(&task.path)?;
        if stored.status != expected_status {
            return Err(QueueError::Conflict {
                path: task.path.clone(),
                expected: expected_status,
                actual: stored.status,
            });
        }
        let text = serde_json::to_vec_pretty(task)?;
        write_atomic(&self.file_for(&task.path), &text)?;
        Ok(())
    }
}

/// In-memory queue store for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct MemQueueStore {
    tasks: Mutex<BTreeMap<String, TaskRecord>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.tasks.lock();
            for task in tasks {
                map.insert(task.path.clone(), task);
            }
        }
        store
    }
}

#[cfg(any(test, feature = "test-support"))]
impl QueueStore for MemQueueStore {
    fn list(&self) -> Result<Vec<TaskRecord>, QueueError> {
        Ok(self.tasks.lock().values().cloned().collect())
    }

    fn get(&self, path: &str) -> Result<TaskRecord, QueueError> {
        self.tasks
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(path.to_string()))
    }

    fn put(&self, task: &TaskRecord) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&task.path) {
            return Err(QueueError::Invariant(format!("task already exists: {}", task.path)));
        }
        tasks.insert(task.path.clone(), task.clone());
        Ok(())
    }

    fn update(&self, task: &TaskRecord, expected_status: TaskStatus) -> Result<(), QueueError> {
        let mut tasks = self.tasks.lock();
        let stored = tasks
            .get(&task.path)
            .ok_or_else(|| QueueError::NotFound(task.path.clone()))?;
        if stored.status != expected_status {
            return Err(QueueError::Conflict {
                path: task.path.clone(),
                expected: expected_status,
                actual: stored.status,
            });
        }
        tasks.insert(task.path.clone(), task.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
