// src/state/store.rs

//! The storage interface behind run state.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dag::Graph;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::state::{FileStateStore, MemoryStateStore, RunInstance, RunKey, TaskInstance};
use crate::types::{StateStoreMode, TaskState};

/// Persists per-task state for runs, keyed by `(dag, task, logical date)`.
///
/// Every write goes through [`StateStore::set`], which must reject
/// transitions that move a task backwards (`InvalidTransition`).
pub trait StateStore: Send + Debug {
    /// Create a run of `graph` at `logical_date` with every task `Pending`.
    fn create(&mut self, graph: &Graph, logical_date: DateTime<Utc>) -> Result<RunInstance>;

    /// Current snapshot of a run.
    fn load(&self, key: &RunKey) -> Result<RunInstance>;

    /// Record a new instance for `task`.
    fn set(&mut self, key: &RunKey, task: &str, instance: TaskInstance) -> Result<()>;

    /// Flag the run as cancelled.
    fn mark_cancelled(&mut self, key: &RunKey) -> Result<()>;

    /// Keys of every known run, ordered by DAG id then logical date.
    fn runs(&self) -> Result<Vec<RunKey>>;

    /// Current state of one task.
    fn get(&self, key: &RunKey, task: &str) -> Result<TaskState> {
        Ok(self.load(key)?.task(task)?.state)
    }
}

/// Build the store selected by `[config].state_store`.
pub fn open_store(mode: StateStoreMode, state_dir: &Path) -> Box<dyn StateStore> {
    match mode {
        StateStoreMode::Memory => Box::new(MemoryStateStore::new()),
        StateStoreMode::File => Box::new(FileStateStore::new(
            Arc::new(RealFileSystem),
            state_dir.to_path_buf(),
        )),
    }
}
