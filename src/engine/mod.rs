// src/engine/mod.rs

//! Orchestration engine for dagflow.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the run queue (run requests that arrive while a run is active)
//! - the main runtime event loop that reacts to:
//!   - run requests
//!   - task completion events
//!   - cancellation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::RunKey;
use crate::types::TaskId;

/// Outcome of one task attempt, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The action succeeded, optionally producing an output for downstream
    /// tasks.
    Success(Option<String>),
    /// The action returned an error.
    Failed(String),
    /// The attempt exceeded the task's timeout.
    TimedOut(Duration),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// Human readable failure description (empty for success).
    pub fn describe(&self) -> String {
        match self {
            TaskOutcome::Success(_) => String::new(),
            TaskOutcome::Failed(reason) => reason.clone(),
            TaskOutcome::TimedOut(limit) => format!("timed out after {limit:?}"),
        }
    }
}

/// Request to run a DAG at a logical date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub dag_id: String,
    pub logical_date: DateTime<Utc>,
}

impl RunRequest {
    pub fn new(dag_id: impl Into<String>, logical_date: DateTime<Utc>) -> Self {
        Self {
            dag_id: dag_id.into(),
            logical_date,
        }
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once the scheduler is idle and there are no
    /// queued run requests.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: true,
        }
    }
}

/// Events flowing into the runtime from the CLI, executors and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Start (or queue) a run.
    RunRequested(RunRequest),
    /// A task attempt finished with a concrete outcome.
    TaskCompleted {
        run: RunKey,
        task: TaskId,
        try_number: u32,
        outcome: TaskOutcome,
    },
    /// Cancel the active run and drop queued requests (e.g. Ctrl-C).
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::RunQueue;
pub use runtime::Runtime;
