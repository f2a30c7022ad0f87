// src/dag/task.rs

//! Task definitions and the dispatch payload handed to the executor.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::{TaskAction, TaskContext};
use crate::types::{TaskId, TriggerRule};

/// Recognised per-task options (`retries`, `timeout`, ...), plus an opaque
/// `params` map for anything provider-specific.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    /// How many times a failed attempt is re-dispatched before the task is
    /// marked `Failed`.
    pub retries: u32,
    /// Wait applied before each retry attempt.
    pub retry_delay: Duration,
    /// Maximum duration of a single attempt.
    pub timeout: Option<Duration>,
    pub trigger_rule: TriggerRule,
    pub params: BTreeMap<String, toml::Value>,
}

/// A single unit of work in a graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,
    pub action: Arc<dyn TaskAction>,
    /// Direct upstream dependencies.
    pub upstream: BTreeSet<TaskId>,
    pub options: TaskOptions,
}

impl TaskNode {
    pub fn new(id: impl Into<TaskId>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            id: id.into(),
            action,
            upstream: BTreeSet::new(),
            options: TaskOptions::default(),
        }
    }

    pub fn after(mut self, upstream: impl Into<TaskId>) -> Self {
        self.upstream.insert(upstream.into());
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.options.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.options.retry_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.options.trigger_rule = rule;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.params.insert(key.into(), value.into());
        self
    }
}

/// Description of a task attempt the scheduler wants the executor to run now.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: TaskId,
    pub action: Arc<dyn TaskAction>,
    pub timeout: Option<Duration>,
    /// Delay before executing; non-zero only for retry attempts.
    pub delay: Duration,
    pub context: TaskContext,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("dag_id", &self.context.dag_id)
            .field("try_number", &self.context.try_number)
            .field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl ScheduledTask {
    pub fn from_task_node(node: &TaskNode, context: TaskContext) -> Self {
        let delay = if context.try_number > 1 {
            node.options.retry_delay
        } else {
            Duration::ZERO
        };

        Self {
            name: node.id.clone(),
            action: Arc::clone(&node.action),
            timeout: node.options.timeout,
            delay,
            context,
        }
    }

    pub fn try_number(&self) -> u32 {
        self.context.try_number
    }
}
