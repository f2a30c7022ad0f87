// src/state/run.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::dag::Graph;
use crate::errors::{DagflowError, Result};
use crate::types::{TaskId, TaskState};

/// Identifies one run: a DAG at a logical date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub dag_id: String,
    pub logical_date: DateTime<Utc>,
}

impl RunKey {
    pub fn new(dag_id: impl Into<String>, logical_date: DateTime<Utc>) -> Self {
        Self {
            dag_id: dag_id.into(),
            logical_date,
        }
    }

    /// RFC 3339 rendering of the logical date, second precision.
    pub fn date_string(&self) -> String {
        self.logical_date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub(crate) fn not_found(&self) -> DagflowError {
        DagflowError::RunNotFound {
            graph: self.dag_id.clone(),
            logical_date: self.date_string(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dag_id, self.date_string())
    }
}

/// State of one task within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub state: TaskState,
    /// Number of times the task has been dispatched in this run.
    #[serde(default)]
    pub try_number: u32,
    /// Success payload, readable by downstream tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Why the task failed or was not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TaskInstance {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            try_number: 0,
            output: None,
            reason: None,
        }
    }

    /// Same instance moved to `state`, keeping the try counter and output.
    pub fn with_state(&self, state: TaskState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One execution of a graph at a logical date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInstance {
    #[serde(default)]
    pub cancelled: bool,
    pub key: RunKey,
    pub tasks: BTreeMap<TaskId, TaskInstance>,
}

impl RunInstance {
    /// A fresh run with every task of `graph` pending.
    pub fn new(graph: &Graph, logical_date: DateTime<Utc>) -> Self {
        let tasks = graph
            .topological_order()
            .iter()
            .map(|id| (id.clone(), TaskInstance::pending()))
            .collect();

        Self {
            key: RunKey::new(graph.id(), logical_date),
            cancelled: false,
            tasks,
        }
    }

    pub fn task(&self, task: &str) -> Result<&TaskInstance> {
        self.tasks
            .get(task)
            .ok_or_else(|| DagflowError::TaskNotFound(format!("{}.{}", self.key.dag_id, task)))
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.tasks.get(task).map(|t| t.state)
    }

    /// Replace a task's instance, rejecting transitions that move backwards.
    pub fn apply(&mut self, task: &str, next: TaskInstance) -> Result<()> {
        let current = self
            .tasks
            .get_mut(task)
            .ok_or_else(|| DagflowError::TaskNotFound(format!("{}.{}", self.key.dag_id, task)))?;

        if !current.state.can_transition_to(next.state) {
            return Err(DagflowError::InvalidTransition {
                task: task.to_string(),
                from: current.state,
                to: next.state,
            });
        }

        *current = next;
        Ok(())
    }

    /// Tasks currently in `state`.
    pub fn tasks_in(&self, state: TaskState) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .filter(move |(_, t)| t.state == state)
            .map(|(id, _)| id.as_str())
    }

    pub fn count_in(&self, state: TaskState) -> usize {
        self.tasks_in(state).count()
    }

    /// No task is `Pending` or `Running`.
    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_terminal())
    }

    /// Finished, and every task is `Success` or `Skipped`.
    pub fn is_successful(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_successful())
    }
}
