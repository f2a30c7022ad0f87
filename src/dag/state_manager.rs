// src/dag/state_manager.rs

//! One evaluation pass over a run.
//!
//! A [`StateManager`] borrows the graph, a snapshot of the run and the state
//! store for the duration of a single scheduler step. Every transition is
//! written to the store first (which enforces the forward-only rule) and then
//! mirrored into the snapshot so later decisions in the same pass see it.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::Graph;
use crate::dag::task::{ScheduledTask, TaskNode};
use crate::errors::Result;
use crate::exec::TaskContext;
use crate::state::{RunInstance, StateStore, TaskInstance};
use crate::types::{TaskId, TaskState, TriggerRule};

/// Reason recorded on tasks left pending when a run is cancelled.
pub const CANCELLED_REASON: &str = "cancelled";

/// What a trigger rule says about a pending task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// May be dispatched now.
    Ready,
    /// Upstream has not progressed far enough to decide.
    Wait,
    /// Can never run; an upstream failure is the cause.
    UpstreamFailed(String),
    /// Can never run; not because of a failure.
    Skip(String),
}

/// Counts of direct upstream states, plus the first failed/skipped upstream
/// for building a reason.
#[derive(Debug, Default)]
struct UpstreamSummary {
    total: usize,
    success: usize,
    failed: usize,
    skipped: usize,
    done: usize,
    failure_reason: Option<String>,
    skip_reason: Option<String>,
}

impl UpstreamSummary {
    fn collect(graph: &Graph, run: &RunInstance, node: &TaskNode) -> Self {
        let mut summary = UpstreamSummary::default();

        for dep in graph.upstream_of(&node.id) {
            summary.total += 1;
            let Some(inst) = run.tasks.get(dep) else {
                warn!(task = %node.id, dep = %dep, "dependency missing from run");
                continue;
            };

            if inst.state.is_terminal() {
                summary.done += 1;
            }

            match inst.state {
                TaskState::Success => summary.success += 1,
                TaskState::Failed => {
                    summary.failed += 1;
                    summary
                        .failure_reason
                        .get_or_insert_with(|| format!("upstream task '{dep}' failed"));
                }
                TaskState::UpstreamFailed => {
                    summary.failed += 1;
                    // Carry the root cause through the chain.
                    summary.failure_reason.get_or_insert_with(|| {
                        inst.reason
                            .clone()
                            .unwrap_or_else(|| format!("upstream task '{dep}' upstream_failed"))
                    });
                }
                TaskState::Skipped => {
                    summary.skipped += 1;
                    summary
                        .skip_reason
                        .get_or_insert_with(|| format!("upstream task '{dep}' skipped"));
                }
                TaskState::Pending | TaskState::Running => {}
            }
        }

        summary
    }

    fn all_done(&self) -> bool {
        self.done == self.total
    }

    fn upstream_failed(&self) -> Readiness {
        Readiness::UpstreamFailed(
            self.failure_reason
                .clone()
                .unwrap_or_else(|| "upstream failed".to_string()),
        )
    }

    fn skip(&self, fallback: &str) -> Readiness {
        Readiness::Skip(self.skip_reason.clone().unwrap_or_else(|| fallback.to_string()))
    }
}

/// Apply the trigger rule of `node` to the current states of its upstream tasks.
pub fn evaluate_trigger_rule(graph: &Graph, run: &RunInstance, node: &TaskNode) -> Readiness {
    let up = UpstreamSummary::collect(graph, run, node);

    if up.total == 0 {
        return Readiness::Ready;
    }

    match node.options.trigger_rule {
        TriggerRule::Always => Readiness::Ready,
        TriggerRule::AllSuccess => {
            if up.success == up.total {
                Readiness::Ready
            } else if up.failed > 0 {
                up.upstream_failed()
            } else if up.skipped > 0 {
                up.skip("upstream skipped")
            } else {
                Readiness::Wait
            }
        }
        TriggerRule::AllFailed => {
            if up.failed == up.total {
                Readiness::Ready
            } else if up.success + up.skipped > 0 {
                Readiness::Skip("not all upstream tasks failed".to_string())
            } else {
                Readiness::Wait
            }
        }
        TriggerRule::AllDone => {
            if up.all_done() {
                Readiness::Ready
            } else {
                Readiness::Wait
            }
        }
        TriggerRule::OneSuccess => {
            if up.success > 0 {
                Readiness::Ready
            } else if !up.all_done() {
                Readiness::Wait
            } else if up.failed > 0 {
                up.upstream_failed()
            } else {
                up.skip("no upstream task succeeded")
            }
        }
        TriggerRule::OneFailed => {
            if up.failed > 0 {
                Readiness::Ready
            } else if up.all_done() {
                Readiness::Skip("no upstream task failed".to_string())
            } else {
                Readiness::Wait
            }
        }
        TriggerRule::NoneFailed => {
            if up.failed > 0 {
                up.upstream_failed()
            } else if up.all_done() {
                Readiness::Ready
            } else {
                Readiness::Wait
            }
        }
        TriggerRule::NoneSkipped => {
            if up.skipped > 0 {
                up.skip("upstream skipped")
            } else if up.all_done() {
                Readiness::Ready
            } else {
                Readiness::Wait
            }
        }
    }
}

/// Tasks resolved without running during a pass.
#[derive(Debug, Default)]
pub struct Resolved {
    pub upstream_failed: Vec<TaskId>,
    pub skipped: Vec<TaskId>,
}

/// Manages per-run state transitions for one scheduler step.
pub struct StateManager<'a> {
    graph: &'a Graph,
    run: &'a mut RunInstance,
    store: &'a mut dyn StateStore,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a Graph, run: &'a mut RunInstance, store: &'a mut dyn StateStore) -> Self {
        Self { graph, run, store }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn run(&self) -> &RunInstance {
        &self.run
    }

    /// Write a transition through the store, then mirror it locally.
    pub fn transition(&mut self, task: &str, next: TaskInstance) -> Result<()> {
        let from = self.run.state_of(task);
        self.store.set(&self.run.key, task, next.clone())?;
        self.run.apply(task, next.clone())?;

        debug!(
            dag = %self.run.key.dag_id,
            task,
            from = ?from,
            to = %next.state,
            try_number = next.try_number,
            "task state transition"
        );
        Ok(())
    }

    /// Resolve pending tasks whose trigger rule can no longer be satisfied.
    ///
    /// Walks the graph in topological order so a resolution cascades to
    /// every descendant within the same pass.
    pub fn resolve_unrunnable(&mut self) -> Result<Resolved> {
        let mut resolved = Resolved::default();
        let graph = self.graph;

        for node in graph.tasks() {
            if self.run.state_of(&node.id) != Some(TaskState::Pending) {
                continue;
            }

            match evaluate_trigger_rule(graph, self.run, node) {
                Readiness::UpstreamFailed(reason) => {
                    let next = self.run.task(&node.id)?.with_state(TaskState::UpstreamFailed);
                    self.transition(&node.id, next.with_reason(reason.clone()))?;
                    warn!(dag = %graph.id(), task = %node.id, %reason, "task will not run: upstream failed");
                    resolved.upstream_failed.push(node.id.clone());
                }
                Readiness::Skip(reason) => {
                    let next = self.run.task(&node.id)?.with_state(TaskState::Skipped);
                    self.transition(&node.id, next.with_reason(reason.clone()))?;
                    info!(dag = %graph.id(), task = %node.id, %reason, "task skipped");
                    resolved.skipped.push(node.id.clone());
                }
                Readiness::Ready | Readiness::Wait => {}
            }
        }

        Ok(resolved)
    }

    /// Collect pending tasks whose trigger rule is satisfied, up to `limit`,
    /// mark them `Running`, and return them as [`ScheduledTask`]s.
    ///
    /// Nothing is dispatched once the run has been cancelled.
    pub fn collect_new_ready_tasks(&mut self, limit: usize) -> Result<Vec<ScheduledTask>> {
        let mut ready = Vec::new();
        if self.run.cancelled || limit == 0 {
            return Ok(ready);
        }

        // Decide first, then mutate.
        let graph = self.graph;
        let run: &RunInstance = &*self.run;
        let candidates: Vec<&TaskNode> = graph
            .tasks()
            .filter(|node| run.state_of(&node.id) == Some(TaskState::Pending))
            .filter(|node| evaluate_trigger_rule(graph, run, node) == Readiness::Ready)
            .take(limit)
            .collect();

        for node in candidates {
            let current = self.run.task(&node.id)?;
            let next = TaskInstance {
                state: TaskState::Running,
                try_number: current.try_number + 1,
                output: None,
                reason: None,
            };
            let try_number = next.try_number;

            if try_number > 1 {
                info!(
                    dag = %graph.id(),
                    task = %node.id,
                    try_number,
                    max_tries = node.options.retries + 1,
                    "scheduling task for retry"
                );
            } else {
                info!(dag = %graph.id(), task = %node.id, "scheduling task");
            }

            self.transition(&node.id, next)?;
            let context = self.context_for(node, try_number);
            ready.push(ScheduledTask::from_task_node(node, context));
        }

        Ok(ready)
    }

    /// Mark every pending task `UpstreamFailed` with reason `cancelled`.
    pub fn cancel_pending(&mut self) -> Result<Vec<TaskId>> {
        let pending: Vec<TaskId> = self
            .run
            .tasks_in(TaskState::Pending)
            .map(str::to_string)
            .collect();

        for task in &pending {
            let next = self
                .run
                .task(task)?
                .with_state(TaskState::UpstreamFailed)
                .with_reason(CANCELLED_REASON);
            self.transition(task, next)?;
        }

        if !pending.is_empty() {
            info!(dag = %self.run.key.dag_id, cancelled = ?pending, "cancelled pending tasks");
        }
        Ok(pending)
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.run.is_finished()
    }

    fn context_for(&self, node: &TaskNode, try_number: u32) -> TaskContext {
        let upstream_outputs: BTreeMap<TaskId, String> = self
            .graph
            .upstream_of(&node.id)
            .filter_map(|dep| {
                let output = self.run.tasks.get(dep)?.output.clone()?;
                Some((dep.to_string(), output))
            })
            .collect();

        TaskContext {
            dag_id: self.graph.id().to_string(),
            task_id: node.id.clone(),
            logical_date: self.run.key.logical_date,
            try_number,
            upstream_outputs,
            params: node.options.params.clone(),
        }
    }
}
