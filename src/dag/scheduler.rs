use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::graph::Graph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::errors::{DagflowError, Result};
use crate::registry::DagRegistry;
use crate::report::RunReport;
use crate::state::{RunInstance, RunKey, StateStore};
use crate::types::TaskState;

#[derive(Debug)]
struct ActiveRun {
    graph: Arc<Graph>,
    key: RunKey,
    finished: bool,
}

/// Drives one run of a graph at a time.
///
/// It is responsible for:
/// - creating the run in the state store
/// - dispatching tasks whose trigger rule is satisfied, within the
///   parallelism width
/// - recording task outcomes, re-enqueueing failed attempts that have
///   retries left
/// - resolving tasks that can never run (upstream failed / skipped)
/// - cancelling a run
///
/// The scheduler is the only writer of task state. Each step loads the run
/// from the store and hands a [`StateManager`] short-lived references to the
/// graph and the run.
#[derive(Debug)]
pub struct Scheduler {
    registry: Arc<DagRegistry>,
    store: Box<dyn StateStore>,
    parallelism: usize,
    /// Current run, or the last one once it has finished.
    active: Option<ActiveRun>,
}

impl Scheduler {
    /// `parallelism` is clamped to at least 1.
    pub fn new(registry: Arc<DagRegistry>, store: Box<dyn StateStore>, parallelism: usize) -> Self {
        Self {
            registry,
            store,
            parallelism: parallelism.max(1),
            active: None,
        }
    }

    pub fn registry(&self) -> &DagRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.active.as_ref().is_none_or(|run| run.finished)
    }

    /// Key of the current run, or of the last run once it finished.
    pub fn current_run(&self) -> Option<&RunKey> {
        self.active.as_ref().map(|run| &run.key)
    }

    /// Snapshot of the current (or last) run.
    pub fn snapshot(&self) -> Result<RunInstance> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| DagflowError::Other(anyhow::anyhow!("no run has been started")))?;
        self.store.load(&active.key)
    }

    /// State of `task` in the current (or last) run.
    pub fn run_state_of(&self, task: &str) -> Option<TaskState> {
        let active = self.active.as_ref()?;
        self.store.get(&active.key, task).ok()
    }

    pub fn report(&self) -> Result<RunReport> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| DagflowError::Other(anyhow::anyhow!("no run has been started")))?;
        let run = self.store.load(&active.key)?;
        Ok(RunReport::from_run(&active.graph, &run))
    }

    /// Create a run of `dag_id` at `logical_date` and dispatch its roots
    /// (production API).
    pub fn start_run(&mut self, dag_id: &str, logical_date: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        Ok(self.step_start(dag_id, logical_date)?.newly_scheduled)
    }

    /// Record a task outcome (production API).
    pub fn handle_completion(
        &mut self,
        key: &RunKey,
        task: &str,
        try_number: u32,
        outcome: TaskOutcome,
    ) -> Result<Vec<ScheduledTask>> {
        Ok(self.step_completion(key, task, try_number, outcome)?.newly_scheduled)
    }

    /// Manual-step variant of `start_run` that returns a rich [`SchedulerStep`].
    pub fn step_start(&mut self, dag_id: &str, logical_date: DateTime<Utc>) -> Result<SchedulerStep> {
        if let Some(active) = self.active.as_ref().filter(|run| !run.finished) {
            return Err(DagflowError::RunInProgress(active.key.to_string()));
        }

        let graph = self.registry.get(dag_id)?;
        let run = self.store.create(&graph, logical_date)?;
        info!(run = %run.key, tasks = graph.len(), parallelism = self.parallelism, "starting DAG run");

        self.active = Some(ActiveRun {
            graph,
            key: run.key,
            finished: false,
        });

        self.pass(|_, _| Ok(()))
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    ///
    /// Completions for another run, an unknown task, a task that is not
    /// running, or an attempt that is not the current one are ignored.
    pub fn step_completion(
        &mut self,
        key: &RunKey,
        task: &str,
        try_number: u32,
        outcome: TaskOutcome,
    ) -> Result<SchedulerStep> {
        if self.current_run() != Some(key) {
            warn!(run = %key, task, "completion for a run that is not active; ignoring");
            return Ok(SchedulerStep::default());
        }

        self.pass(|mgr, step| {
            let (current, retries) = match (mgr.run().tasks.get(task), mgr.graph().node(task)) {
                (Some(inst), Some(node)) => (inst.clone(), node.options.retries),
                _ => {
                    warn!(task, "completion for unknown task; ignoring");
                    return Ok(());
                }
            };

            if current.state != TaskState::Running || current.try_number != try_number {
                warn!(
                    task,
                    try_number,
                    state = %current.state,
                    current_try = current.try_number,
                    "stale completion; ignoring"
                );
                return Ok(());
            }

            match outcome {
                TaskOutcome::Success(output) => {
                    info!(task, try_number, "task succeeded");
                    let mut next = current.with_state(TaskState::Success);
                    next.output = output;
                    next.reason = None;
                    mgr.transition(task, next)
                }
                failure => {
                    let reason = failure.describe();
                    let cancelled = mgr.run().cancelled;

                    if !cancelled && try_number <= retries {
                        warn!(
                            task,
                            try_number,
                            retries,
                            %reason,
                            "task attempt failed; re-enqueueing for retry"
                        );
                        let next = current
                            .with_state(TaskState::Pending)
                            .with_reason(format!("attempt {try_number} failed: {reason}"));
                        mgr.transition(task, next)?;
                        step.retried.push(task.to_string());
                    } else {
                        warn!(task, try_number, %reason, "task failed");
                        let next = current.with_state(TaskState::Failed).with_reason(reason);
                        mgr.transition(task, next)?;
                        step.newly_failed.push(task.to_string());
                    }
                    Ok(())
                }
            }
        })
    }

    /// Re-evaluate readiness without any state change.
    ///
    /// Dispatches nothing unless a slot or a dependency changed since the
    /// last step.
    pub fn step_evaluate(&mut self) -> Result<SchedulerStep> {
        self.pass(|_, _| Ok(()))
    }

    /// Cancel the active run: no further dispatches, every pending task is
    /// marked `UpstreamFailed` with reason `cancelled`. Running tasks keep
    /// running and their outcome is still recorded.
    pub fn cancel(&mut self) -> Result<SchedulerStep> {
        let key = match self.active.as_ref() {
            Some(run) if !run.finished => run.key.clone(),
            _ => {
                debug!("cancel requested with no active run; ignoring");
                return Ok(SchedulerStep::default());
            }
        };

        info!(run = %key, "cancelling run");
        self.store.mark_cancelled(&key)?;

        self.pass(|mgr, step| {
            step.newly_failed.extend(mgr.cancel_pending()?);
            Ok(())
        })
    }

    /// Run one evaluation pass over the active run.
    ///
    /// `mutate` records the triggering change; the pass then resolves tasks
    /// that can never run, dispatches newly ready tasks into free slots, and
    /// detects the end of the run.
    fn pass<F>(&mut self, mutate: F) -> Result<SchedulerStep>
    where
        F: FnOnce(&mut StateManager<'_>, &mut SchedulerStep) -> Result<()>,
    {
        let (graph, key) = match self.active.as_ref() {
            Some(run) if !run.finished => (Arc::clone(&run.graph), run.key.clone()),
            _ => return Ok(SchedulerStep::default()),
        };

        let parallelism = self.parallelism;
        let mut run = self.store.load(&key)?;
        let mut step = SchedulerStep::default();

        let finished = {
            let mut mgr = StateManager::new(&graph, &mut run, self.store.as_mut());
            mutate(&mut mgr, &mut step)?;

            let resolved = mgr.resolve_unrunnable()?;
            step.newly_failed.extend(resolved.upstream_failed);
            step.newly_skipped.extend(resolved.skipped);

            let running = mgr.run().count_in(TaskState::Running);
            let free = parallelism.saturating_sub(running);
            step.newly_scheduled = mgr.collect_new_ready_tasks(free)?;

            mgr.all_tasks_terminal()
        };

        if finished {
            info!(
                run = %key,
                success = run.is_successful(),
                cancelled = run.cancelled,
                "all tasks terminal; run finished"
            );
            if let Some(active) = self.active.as_mut() {
                active.finished = true;
            }
            step.run_just_finished = true;
        }

        Ok(step)
    }
}
