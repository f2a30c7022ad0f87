// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::TaskState;

#[derive(Error, Debug)]
pub enum DagflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate task id '{task}' in DAG '{graph}'")]
    DuplicateTaskId { graph: String, task: String },

    #[error("Task '{task}' in DAG '{graph}' has unknown dependency '{dependency}'")]
    UnknownDependency {
        graph: String,
        task: String,
        dependency: String,
    },

    #[error("Cycle detected in DAG '{graph}': {}", cycle.join(" -> "))]
    DependencyCycle { graph: String, cycle: Vec<String> },

    #[error("Invalid state transition for task '{task}': {from} -> {to}")]
    InvalidTransition {
        task: String,
        from: TaskState,
        to: TaskState,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Unknown DAG: {0}")]
    UnknownDag(String),

    #[error("No run for DAG '{graph}' at {logical_date}")]
    RunNotFound { graph: String, logical_date: String },

    #[error("A run for DAG '{graph}' at {logical_date} already exists")]
    RunAlreadyExists { graph: String, logical_date: String },

    #[error("A run is already in progress: {0}")]
    RunInProgress(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagflowError>;
