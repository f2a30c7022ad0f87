// src/exec/action.rs

//! The interface between the scheduler and the work a task performs.
//!
//! The core never looks inside an action: it hands it a [`TaskContext`] and
//! only cares whether the returned future resolves to `Ok` or `Err`.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::types::TaskId;

/// Successful result of an action.
///
/// `value` is made available to downstream tasks through
/// [`TaskContext::upstream_output`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub value: Option<String>,
}

impl ActionOutput {
    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// Future returned by [`TaskAction::execute`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<ActionOutput>> + Send + 'a>>;

/// Run-scoped parameters passed to an action for one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub dag_id: String,
    pub task_id: TaskId,
    pub logical_date: DateTime<Utc>,
    /// 1 for the first attempt, 2 for the first retry, ...
    pub try_number: u32,
    /// Outputs of direct upstream tasks that produced one.
    pub upstream_outputs: BTreeMap<TaskId, String>,
    /// Provider-specific options from the task's `params` table.
    pub params: BTreeMap<String, toml::Value>,
}

impl TaskContext {
    /// Output of the named upstream task, if it produced one.
    pub fn upstream_output(&self, task: &str) -> Option<&str> {
        self.upstream_outputs.get(task).map(String::as_str)
    }

    pub fn param(&self, key: &str) -> Option<&toml::Value> {
        self.params.get(key)
    }
}

/// Unit of work attached to a task node.
///
/// Implemented by [`super::CommandAction`] for shell commands, by
/// [`EmptyAction`] for placeholder tasks, and by callers for anything else
/// (API clients, data-sync triggers, ...).
pub trait TaskAction: Send + Sync + fmt::Debug {
    fn execute(&self, ctx: TaskContext) -> ActionFuture<'_>;
}

/// Action that does nothing and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyAction;

impl TaskAction for EmptyAction {
    fn execute(&self, _ctx: TaskContext) -> ActionFuture<'_> {
        Box::pin(async { Ok(ActionOutput::empty()) })
    }
}
