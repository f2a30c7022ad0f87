// src/engine/core.rs

//! Synchronous heart of the engine.
//!
//! [`CoreRuntime`] turns one [`RuntimeEvent`] at a time into scheduler calls
//! and answers with [`CoreCommand`](crate::engine::CoreCommand)s: tasks to
//! dispatch, finished run reports, or a request to stop. Channels, the
//! executor and the cancellation token live in `engine::runtime`.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreStep, handle_cancel, handle_run_request, handle_start_queued, handle_task_completion,
};
use crate::engine::queue::RunQueue;
use crate::engine::{RunRequest, RuntimeEvent, RuntimeOptions};
use crate::errors::Result;

/// Scheduler, pending run requests and runtime options. Performs no IO
/// beyond the scheduler's state store.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: RunQueue,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            queue: RunQueue::new(),
            options,
        }
    }

    /// No run is active.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// No run request is waiting.
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Queue a run request without starting it. Queued requests start, in
    /// order, on the next call to [`CoreRuntime::start_queued`] or when the
    /// current run finishes.
    pub fn enqueue(&mut self, request: RunRequest) {
        self.queue.record(request);
    }

    /// Start queued runs while the scheduler is idle.
    pub fn start_queued(&mut self) -> Result<CoreStep> {
        handle_start_queued(&mut self.scheduler, &mut self.queue, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> Result<CoreStep> {
        match event {
            RuntimeEvent::RunRequested(request) => {
                handle_run_request(&mut self.scheduler, &mut self.queue, &self.options, request)
            }
            RuntimeEvent::TaskCompleted {
                run,
                task,
                try_number,
                outcome,
            } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                &run,
                &task,
                try_number,
                outcome,
            ),
            RuntimeEvent::CancelRequested => {
                handle_cancel(&mut self.scheduler, &mut self.queue, &self.options)
            }
        }
    }
}
