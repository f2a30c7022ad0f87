// src/report.rs

//! End-of-run summary shown to the user.

use std::fmt;

use crate::dag::Graph;
use crate::state::{RunInstance, RunKey};
use crate::types::{TaskId, TaskState};

/// Final (or current) state of one task in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub state: TaskState,
    pub try_number: u32,
    pub output: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task ended `Success` or `Skipped`.
    Success,
    /// All tasks are terminal and at least one did not succeed.
    Failed,
    /// Some task is still pending or running.
    Running,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Success => "success",
            RunOutcome::Failed => "failed",
            RunOutcome::Running => "running",
        };
        f.write_str(s)
    }
}

/// Every task of a run with its state and failure reason, in topological
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub key: RunKey,
    pub cancelled: bool,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn from_run(graph: &Graph, run: &RunInstance) -> Self {
        let tasks = graph
            .topological_order()
            .iter()
            .filter_map(|id| {
                let inst = run.tasks.get(id)?;
                Some(TaskReport {
                    task_id: id.clone(),
                    state: inst.state,
                    try_number: inst.try_number,
                    output: inst.output.clone(),
                    reason: inst.reason.clone(),
                })
            })
            .collect();

        Self {
            key: run.key.clone(),
            cancelled: run.cancelled,
            tasks,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.tasks.iter().any(|t| !t.state.is_terminal()) {
            RunOutcome::Running
        } else if self.tasks.iter().all(|t| t.state.is_successful()) {
            RunOutcome::Success
        } else {
            RunOutcome::Failed
        }
    }

    pub fn is_successful(&self) -> bool {
        self.outcome() == RunOutcome::Success
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn state_of(&self, task_id: &str) -> Option<TaskState> {
        self.task(task_id).map(|t| t.state)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {}: {}", self.key, self.outcome())?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        writeln!(f)?;

        let width = self.tasks.iter().map(|t| t.task_id.len()).max().unwrap_or(0);
        for t in &self.tasks {
            write!(
                f,
                "  {:<width$}  {:<15}  tries={}",
                t.task_id,
                t.state.to_string(),
                t.try_number,
                width = width
            )?;
            if let Some(reason) = &t.reason {
                if t.state != TaskState::Success {
                    write!(f, "  reason: {reason}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
