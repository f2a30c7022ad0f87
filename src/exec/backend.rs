// src/exec/backend.rs

//! Where dispatched attempts go.
//!
//! The runtime hands every batch of [`ScheduledTask`]s to an
//! [`ExecutorBackend`]. Production wires in [`RealExecutorBackend`], which
//! feeds the executor loop; test suites plug in backends that answer with
//! canned `TaskCompleted` events instead of running actions.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::trace;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};

use super::executor_loop::spawn_executor;

/// Boxed future returned by [`ExecutorBackend::spawn_ready_tasks`].
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Accepts attempts chosen by the scheduler.
pub trait ExecutorBackend: Send {
    /// Hand `tasks` over for execution and return once they are accepted.
    ///
    /// Implementations report each attempt's outcome later, as a
    /// `RuntimeEvent::TaskCompleted` on the runtime channel.
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_>;
}

/// Backend that runs actions on the Tokio executor loop.
pub struct RealExecutorBackend {
    loop_tx: mpsc::Sender<ScheduledTask>,
}

impl fmt::Debug for RealExecutorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealExecutorBackend")
            .field("loop_closed", &self.loop_tx.is_closed())
            .finish()
    }
}

impl RealExecutorBackend {
    /// Start the executor loop; completions are sent to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            loop_tx: spawn_executor(runtime_tx),
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_> {
        let loop_tx = self.loop_tx.clone();

        Box::pin(async move {
            for task in tasks {
                trace!(task = %task.name, try_number = task.try_number(), "handing attempt to executor loop");
                loop_tx.send(task).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
