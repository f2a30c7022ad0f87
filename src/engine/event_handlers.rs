// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{error, info, warn};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::queue::RunQueue;
use crate::engine::{RunRequest, RuntimeOptions, TaskOutcome};
use crate::errors::{DagflowError, Result};
use crate::report::RunReport;
use crate::state::RunKey;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// A run reached a terminal state.
    RunFinished(RunReport),
    /// Request that the runtime exits (idle with nothing queued).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute (send tasks, report, exit).
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Handle a run request.
///
/// - If the scheduler is idle, the run starts immediately.
/// - Otherwise the request is queued until the active run finishes.
pub fn handle_run_request(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    request: RunRequest,
) -> Result<CoreStep> {
    if !scheduler.is_idle() {
        queue.record(request);
        return Ok(CoreStep {
            commands: Vec::new(),
            keep_running: true,
        });
    }

    let step = start_run(scheduler, &request)?.unwrap_or_default();
    follow_up(scheduler, queue, options, step)
}

/// Start a run, dropping requests the scheduler rejects (unknown DAG, run
/// already recorded) so they don't take other runs down with them.
fn start_run(scheduler: &mut Scheduler, request: &RunRequest) -> Result<Option<SchedulerStep>> {
    match scheduler.step_start(&request.dag_id, request.logical_date) {
        Ok(step) => Ok(Some(step)),
        Err(err @ (DagflowError::UnknownDag(_) | DagflowError::RunAlreadyExists { .. })) => {
            error!(
                dag = %request.dag_id,
                logical_date = %request.logical_date,
                error = %err,
                "run request rejected"
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    run: &RunKey,
    task: &str,
    try_number: u32,
    outcome: TaskOutcome,
) -> Result<CoreStep> {
    let step = scheduler.step_completion(run, task, try_number, outcome)?;
    follow_up(scheduler, queue, options, step)
}

/// Handle a cancellation request: queued runs are dropped and the active
/// run stops dispatching.
pub fn handle_cancel(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
) -> Result<CoreStep> {
    let dropped = queue.clear();
    if dropped > 0 {
        warn!(dropped, "cancellation dropped queued run requests");
    }

    let step = scheduler.cancel()?;
    follow_up(scheduler, queue, options, step)
}

/// Start queued runs if the scheduler is idle (used when requests were
/// queued before the runtime loop started).
pub fn handle_start_queued(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
) -> Result<CoreStep> {
    follow_up(scheduler, queue, options, SchedulerStep::default())
}

/// Turn a scheduler step into commands: dispatch what became ready, report
/// a finished run, start queued runs while the scheduler is idle, and decide
/// whether the runtime should exit.
fn follow_up(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    step: SchedulerStep,
) -> Result<CoreStep> {
    let mut commands = Vec::new();
    let mut step = step;

    loop {
        if !step.newly_scheduled.is_empty() {
            commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
        }

        if step.run_just_finished {
            let report = scheduler.report()?;
            info!(run = %report.key, outcome = %report.outcome(), "run finished");
            commands.push(CoreCommand::RunFinished(report));
        }

        if !scheduler.is_idle() {
            break;
        }

        match queue.pop() {
            Some(next) => {
                step = start_run(scheduler, &next)?.unwrap_or_default();
            }
            None => break,
        }
    }

    let mut keep_running = true;
    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    Ok(CoreStep {
        commands,
        keep_running,
    })
}
