// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{StateStoreMode, TriggerRule};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// parallelism = 4
///
/// [default]
/// retries = 1
///
/// [dag.etl]
/// chain = ["extract", "transform", "load"]
///
/// [dag.etl.task.extract]
/// cmd = "echo rows.csv"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Task defaults applied to every DAG from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All DAGs from `[dag.<id>]`, keyed by DAG id.
    #[serde(default)]
    pub dag: BTreeMap<String, DagConfig>,
}

/// Validated configuration.
///
/// Only produced through `TryFrom<RawConfigFile>`, so holders can rely on
/// every DAG building into a graph and every duration parsing.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub dag: BTreeMap<String, DagConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        dag: BTreeMap<String, DagConfig>,
    ) -> Self {
        Self {
            config,
            default,
            dag,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks running at once. Must be >= 1.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// `"memory"` (default) or `"file"`.
    #[serde(default)]
    pub state_store: StateStoreMode,

    /// Directory used by the file state store.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_parallelism() -> usize {
    4
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".dagflow")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            state_store: StateStoreMode::default(),
            state_dir: default_state_dir(),
        }
    }
}

/// Task defaults, used both for the global `[default]` section and for
/// `[dag.<id>.default]`.
///
/// Precedence for each field: task, then DAG default, then global default,
/// then the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub retries: Option<u32>,

    /// Duration string, e.g. `"30s"`.
    #[serde(default)]
    pub retry_delay: Option<String>,

    /// Duration string, e.g. `"10m"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub trigger_rule: Option<TriggerRule>,
}

/// `[dag.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Sequential dependencies: `["a", "b", "c"]` means `a >> b >> c`.
    #[serde(default)]
    pub chain: Vec<String>,

    /// Per-DAG task defaults from `[dag.<id>.default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// Tasks from `[dag.<id>.task.<name>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[dag.<id>.task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Shell command to execute. Tasks without one succeed without doing
    /// anything.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub trigger_rule: Option<TriggerRule>,

    /// Free-form options passed through to the task's action context.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}
