// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::report::RunReport;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the DAG scheduler in response to `RuntimeEvent`s,
/// and delegates actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, watching the cancellation token and dispatching tasks to the
/// executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    cancel: CancellationToken,
    reports: Vec<RunReport>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("reports", &self.reports.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            cancel: CancellationToken::new(),
            reports: Vec::new(),
        }
    }

    /// Use `token` to cancel the active run (e.g. wired to Ctrl-C).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (dispatch tasks, collect
    ///   reports, exit).
    ///
    /// Returns the report of every run that finished, in completion order.
    pub async fn run(mut self) -> Result<Vec<RunReport>> {
        info!("dagflow runtime started");
        let mut cancel_forwarded = false;

        // Requests queued before the loop started.
        if !self.core.queue_is_empty() {
            let step = self.core.start_queued()?;
            for command in step.commands {
                self.execute_command(command).await?;
            }
            if !step.keep_running {
                info!("nothing left to run; stopping runtime");
                return Ok(self.reports);
            }
        }

        loop {
            let event = tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = self.cancel.cancelled(), if !cancel_forwarded => {
                    cancel_forwarded = true;
                    warn!("cancellation requested; no new tasks will be dispatched");
                    RuntimeEvent::CancelRequested
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event)?;

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        if !self.core.is_idle() {
            warn!("runtime stopped with a run still in progress");
        }

        info!(runs = self.reports.len(), "runtime exiting");
        Ok(self.reports)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::RunFinished(report) => {
                self.reports.push(report);
            }
            CoreCommand::RequestExit => {
                // keep_running=false already ends the loop.
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        let tries: Vec<_> = tasks.iter().map(|t| t.try_number()).collect();
        debug!(?names, ?tries, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
