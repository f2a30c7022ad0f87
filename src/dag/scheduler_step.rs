// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task::ScheduledTask;
use crate::types::TaskId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked `Failed` or `UpstreamFailed` in this step.
    pub newly_failed: Vec<TaskId>,
    /// Tasks newly marked `Skipped` in this step.
    pub newly_skipped: Vec<TaskId>,
    /// Tasks whose failed attempt was re-enqueued for another try.
    pub retried: Vec<TaskId>,
    /// Whether this step caused the current run to finish (i.e. the scheduler
    /// is now idle).
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }
}
