// src/exec/mod.rs

//! Execution layer.
//!
//! This module is responsible for actually running task actions and
//! reporting back to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`action`] defines the `TaskAction` interface and its `TaskContext`.
//! - [`command`] is the shell command action used by DAG files.
//! - [`executor_loop`] owns the main executor loop which spawns attempts.
//! - [`task_runner`] runs a single attempt (delay, timeout, panic capture).
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod action;
pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use action::{ActionFuture, ActionOutput, EmptyAction, TaskAction, TaskContext};
pub use backend::{DispatchFuture, ExecutorBackend, RealExecutorBackend};
pub use command::CommandAction;
pub use executor_loop::spawn_executor;
