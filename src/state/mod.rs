// src/state/mod.rs

//! Run state persistence.
//!
//! - [`run`] defines [`RunKey`], [`RunInstance`] and [`TaskInstance`], and
//!   enforces the forward-only task state transitions.
//! - [`store`] defines the [`StateStore`] trait the scheduler writes through.
//! - [`memory`] and [`file`] are the two backends selectable from config.

pub mod file;
pub mod memory;
pub mod run;
pub mod store;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use run::{RunKey, RunInstance, TaskInstance};
pub use store::{StateStore, open_store};
