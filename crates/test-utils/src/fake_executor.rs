use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use dagflow::dag::ScheduledTask;
use dagflow::engine::{RuntimeEvent, TaskOutcome};
use dagflow::exec::{DispatchFuture, ExecutorBackend};
use dagflow::state::RunKey;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were "run", with their try number
/// - immediately reports `TaskCompleted` for each scheduled task, using a
///   scripted outcome when one is queued for the task, else `Success`
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<(String, u32)>>>,
    outcomes: HashMap<String, VecDeque<TaskOutcome>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<(String, u32)>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            outcomes: HashMap::new(),
        }
    }

    /// Queue outcomes for successive attempts of `task`.
    pub fn with_outcomes(mut self, task: &str, outcomes: impl IntoIterator<Item = TaskOutcome>) -> Self {
        self.outcomes
            .entry(task.to_string())
            .or_default()
            .extend(outcomes);
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        // Pick outcomes now so the future doesn't borrow the script.
        let completions: Vec<RuntimeEvent> = tasks
            .iter()
            .map(|t| {
                let outcome = self
                    .outcomes
                    .get_mut(&t.name)
                    .and_then(|queue| queue.pop_front())
                    .unwrap_or(TaskOutcome::Success(None));
                RuntimeEvent::TaskCompleted {
                    run: RunKey::new(t.context.dag_id.clone(), t.context.logical_date),
                    task: t.name.clone(),
                    try_number: t.try_number(),
                    outcome,
                }
            })
            .collect();

        Box::pin(async move {
            for t in &tasks {
                executed.lock().unwrap().push((t.name.clone(), t.try_number()));
            }

            for event in completions {
                tx.send(event).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
