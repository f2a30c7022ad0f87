#![allow(dead_code)]

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use dagflow::config::{
    ConfigFile, ConfigSection, DagConfig, DefaultSection, RawConfigFile, TaskConfig,
};
use dagflow::dag::{Graph, GraphBuilder, TaskNode};
use dagflow::exec::{EmptyAction, TaskAction};
use dagflow::types::{StateStoreMode, TriggerRule};

/// Task node that does nothing.
pub fn empty_task(id: &str) -> TaskNode {
    TaskNode::new(id, Arc::new(EmptyAction))
}

/// Task node running `action`.
pub fn task_with(id: &str, action: Arc<dyn TaskAction>) -> TaskNode {
    TaskNode::new(id, action)
}

/// Build a graph of empty tasks from `(task, upstream)` pairs.
///
/// Panics if the graph is invalid; use `GraphBuilder` directly to test
/// validation errors.
pub fn graph_of(id: &str, tasks: &[(&str, &[&str])]) -> Graph {
    let mut builder = GraphBuilder::new(id);
    for (name, deps) in tasks {
        let mut node = empty_task(name);
        for dep in deps.iter() {
            node = node.after(*dep);
        }
        builder.add_task(node);
    }
    builder.build().expect("test graph should be valid")
}

fn rule(s: &str) -> TriggerRule {
    TriggerRule::from_str(s).expect("valid trigger rule in test")
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                dag: BTreeMap::new(),
            },
        }
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.config.parallelism = n;
        self
    }

    pub fn file_store(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.config.state_store = StateStoreMode::File;
        self.config.config.state_dir = dir.into();
        self
    }

    pub fn default_retries(mut self, n: u32) -> Self {
        self.config.default.retries = Some(n);
        self
    }

    pub fn default_timeout(mut self, duration: &str) -> Self {
        self.config.default.timeout = Some(duration.to_string());
        self
    }

    pub fn default_trigger_rule(mut self, trigger_rule: &str) -> Self {
        self.config.default.trigger_rule = Some(rule(trigger_rule));
        self
    }

    pub fn with_dag(mut self, id: &str, dag: DagConfig) -> Self {
        self.config.dag.insert(id.to_string(), dag);
        self
    }

    /// Add a task to `dag`, creating the DAG section if needed.
    pub fn with_task(mut self, dag: &str, name: &str, task: TaskConfig) -> Self {
        self.config
            .dag
            .entry(dag.to_string())
            .or_default()
            .task
            .insert(name.to_string(), task);
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `DagConfig`.
#[derive(Default)]
pub struct DagConfigBuilder {
    dag: DagConfig,
}

impl DagConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, text: &str) -> Self {
        self.dag.description = Some(text.to_string());
        self
    }

    pub fn chain(mut self, tasks: &[&str]) -> Self {
        self.dag.chain = tasks.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn default_retries(mut self, n: u32) -> Self {
        self.dag.default.retries = Some(n);
        self
    }

    pub fn default_retry_delay(mut self, duration: &str) -> Self {
        self.dag.default.retry_delay = Some(duration.to_string());
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.dag.task.insert(name.to_string(), task);
        self
    }

    pub fn build(self) -> DagConfig {
        self.dag
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task without a command.
    pub fn empty() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn retry_delay(mut self, duration: &str) -> Self {
        self.task.retry_delay = Some(duration.to_string());
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn trigger_rule(mut self, trigger_rule: &str) -> Self {
        self.task.trigger_rule = Some(rule(trigger_rule));
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task.params.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
