// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] validates task nodes into an immutable acyclic [`Graph`].
//! - [`task`] defines task nodes, their options, and scheduled attempts.
//! - [`state_manager`] runs one evaluation pass: trigger rules, skip and
//!   upstream-failure propagation, dispatch.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, retries failed attempts and finishes runs.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task;

pub use graph::{Graph, GraphBuilder};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state_manager::{CANCELLED_REASON, Readiness, evaluate_trigger_rule};
pub use task::{ScheduledTask, TaskNode, TaskOptions};
