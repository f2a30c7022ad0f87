use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use dagflow::exec::{ActionFuture, ActionOutput, TaskAction, TaskContext};

/// What one scripted attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Option<String>),
    Fail(String),
    /// Sleep, then succeed without output.
    Sleep(Duration),
    /// Never finish (until aborted).
    Hang,
    Panic,
}

/// A fake action that:
/// - plays back a script of outcomes, one per attempt
/// - succeeds without output once the script is exhausted
/// - records the context of every attempt
#[derive(Debug, Default)]
pub struct ScriptedAction {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<TaskContext>>,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl ScriptedAction {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        })
    }

    /// Always succeeds without output.
    pub fn ok() -> Arc<Self> {
        Self::new(Vec::<Step>::new())
    }

    /// Always succeeds with `value` as output.
    pub fn output(value: &str) -> Arc<Self> {
        Self::new([Step::Succeed(Some(value.to_string()))])
    }

    /// Plays `steps` while counting concurrent attempts in `probe`.
    pub fn probed(steps: impl IntoIterator<Item = Step>, probe: Arc<ConcurrencyProbe>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            probe: Some(probe),
        })
    }

    pub fn calls(&self) -> Vec<TaskContext> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TaskAction for ScriptedAction {
    fn execute(&self, ctx: TaskContext) -> ActionFuture<'_> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Succeed(None));
        self.calls.lock().unwrap().push(ctx);
        let probe = self.probe.clone();

        Box::pin(async move {
            let _guard = probe.as_ref().map(|p| p.enter());
            match step {
                Step::Succeed(value) => Ok(ActionOutput { value }),
                Step::Fail(message) => Err(anyhow!(message)),
                Step::Sleep(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(ActionOutput::empty())
                }
                Step::Hang => loop {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                },
                Step::Panic => panic!("scripted panic"),
            }
        })
    }
}

/// Tracks how many attempts are in flight at once.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            probe: Arc::clone(self),
        }
    }
}

struct ProbeGuard {
    probe: Arc<ConcurrencyProbe>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}
