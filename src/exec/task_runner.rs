// src/exec/task_runner.rs

//! Individual task attempt runner.

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::action::ActionOutput;
use crate::state::RunKey;

/// Run one attempt of a task and emit exactly one `TaskCompleted` event.
///
/// - waits out the retry delay first
/// - the action runs in its own Tokio task, so a panic becomes a failure
///   instead of taking the executor down
/// - if the timeout elapses the action task is aborted and the attempt is
///   reported as `TimedOut`
pub async fn run_task(task: ScheduledTask, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let run = RunKey::new(task.context.dag_id.clone(), task.context.logical_date);
    let name = task.name.clone();
    let try_number = task.try_number();

    let outcome = execute_attempt(task).await;

    match &outcome {
        TaskOutcome::Success(_) => {
            info!(run = %run, task = %name, try_number, "task attempt succeeded")
        }
        failure => warn!(
            run = %run,
            task = %name,
            try_number,
            reason = %failure.describe(),
            "task attempt failed"
        ),
    }

    let event = RuntimeEvent::TaskCompleted {
        run,
        task: name.clone(),
        try_number,
        outcome,
    };

    if runtime_tx.send(event).await.is_err() {
        error!(task = %name, try_number, "runtime is gone; dropping task completion");
    }
}

async fn execute_attempt(task: ScheduledTask) -> TaskOutcome {
    if !task.delay.is_zero() {
        debug!(task = %task.name, delay = ?task.delay, "waiting before retry");
        tokio::time::sleep(task.delay).await;
    }

    let action = task.action;
    let ctx = task.context;
    let mut handle = tokio::spawn(async move { action.execute(ctx).await });

    match task.timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => outcome_of(joined),
            Err(_) => {
                handle.abort();
                TaskOutcome::TimedOut(limit)
            }
        },
        None => outcome_of(handle.await),
    }
}

fn outcome_of(joined: Result<anyhow::Result<ActionOutput>, JoinError>) -> TaskOutcome {
    match joined {
        Ok(Ok(output)) => TaskOutcome::Success(output.value),
        Ok(Err(err)) => TaskOutcome::Failed(format!("{err:#}")),
        Err(err) if err.is_panic() => TaskOutcome::Failed("action panicked".to_string()),
        Err(_) => TaskOutcome::Failed("action was cancelled".to_string()),
    }
}
