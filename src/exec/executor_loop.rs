// src/exec/executor_loop.rs

//! Main executor loop that manages running task attempts.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledTask>` is what
/// [`super::RealExecutorBackend`] forwards dispatched tasks to. Each attempt
/// runs in its own Tokio task and reports back with
/// `RuntimeEvent::TaskCompleted`.
///
/// The loop does not limit concurrency itself: the scheduler never has more
/// than `parallelism` tasks running, so it never hands out more than that.
pub fn spawn_executor(runtime_tx: mpsc::Sender<RuntimeEvent>) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // Latest attempt per (dag, task).
        let mut active: HashMap<(String, String), JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &mut active, &runtime_tx);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<(String, String), JoinHandle<()>>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let key = (task.context.dag_id.clone(), task.name.clone());

    if active.get(&key).is_some_and(|existing| !existing.is_finished()) {
        // The scheduler only re-dispatches after a completion, so the old
        // attempt is about to report. Its completion will be ignored as stale.
        warn!(
            dag = %key.0,
            task = %key.1,
            try_number = task.try_number(),
            "previous attempt still finishing while a new one starts"
        );
    }

    let rt_tx = runtime_tx.clone();
    let spawn_name = task.name.clone();

    let handle = tokio::spawn(async move {
        run_task(task, rt_tx).await;
        debug!(task = %spawn_name, "task runner future finished");
    });

    active.retain(|_, h| !h.is_finished());
    active.insert(key, handle);
}
