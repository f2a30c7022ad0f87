// src/config/validate.rs

use std::sync::Arc;
use std::time::Duration;

use crate::config::model::{ConfigFile, DagConfig, DefaultSection, RawConfigFile, TaskConfig};
use crate::dag::{Graph, GraphBuilder, TaskNode, TaskOptions};
use crate::errors::{DagflowError, Result};
use crate::exec::{CommandAction, EmptyAction, TaskAction};
use crate::registry::DagRegistry;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DagflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.dag))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_dags(cfg)?;
    validate_global_config(cfg)?;
    for (dag_id, dag) in cfg.dag.iter() {
        validate_dag_id(dag_id)?;
        ensure_has_tasks(dag_id, dag)?;
        validate_chain(dag_id, dag)?;
        // Building the graph checks durations, references and cycles.
        build_graph(dag_id, dag, &cfg.default)?;
    }
    Ok(())
}

fn ensure_has_dags(cfg: &RawConfigFile) -> Result<()> {
    if cfg.dag.is_empty() {
        return Err(DagflowError::ConfigError(
            "config must contain at least one [dag.<id>] section".to_string(),
        ));
    }
    Ok(())
}

/// DAG ids name a directory under `[config].state_dir`, so they must be a
/// single plain path component.
fn validate_dag_id(dag_id: &str) -> Result<()> {
    let plain = !dag_id.trim().is_empty()
        && dag_id != "."
        && !dag_id.contains(['/', '\\'])
        && !dag_id.contains("..");
    if !plain {
        return Err(DagflowError::ConfigError(format!(
            "invalid DAG id '{dag_id}': must be non-empty and must not contain path separators or '..'"
        )));
    }
    Ok(())
}

fn ensure_has_tasks(dag_id: &str, dag: &DagConfig) -> Result<()> {
    if dag.task.is_empty() {
        return Err(DagflowError::ConfigError(format!(
            "DAG '{dag_id}' must contain at least one [dag.{dag_id}.task.<name>] section"
        )));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.parallelism == 0 {
        return Err(DagflowError::ConfigError(
            "[config].parallelism must be >= 1 (got 0)".to_string(),
        ));
    }

    // Task-level durations are checked per DAG; the global ones are checked
    // here so the error names the right section.
    check_defaults("[default]", &cfg.default)?;
    Ok(())
}

fn check_defaults(section: &str, defaults: &DefaultSection) -> Result<()> {
    if let Some(s) = &defaults.retry_delay {
        parse_duration_field(section, "retry_delay", s)?;
    }
    if let Some(s) = &defaults.timeout {
        parse_duration_field(section, "timeout", s)?;
    }
    Ok(())
}

fn validate_chain(dag_id: &str, dag: &DagConfig) -> Result<()> {
    for name in dag.chain.iter() {
        if !dag.task.contains_key(name) {
            return Err(DagflowError::ConfigError(format!(
                "chain of DAG '{dag_id}' references unknown task '{name}'"
            )));
        }
    }
    Ok(())
}

/// Build every configured DAG into a registry.
pub fn build_registry(cfg: &ConfigFile) -> Result<DagRegistry> {
    let mut registry = DagRegistry::new();
    for (dag_id, dag) in cfg.dag.iter() {
        registry.register(build_graph(dag_id, dag, &cfg.default)?)?;
    }
    Ok(registry)
}

/// Build one DAG section into a validated [`Graph`].
///
/// Tasks with a `cmd` get a [`CommandAction`], the rest an [`EmptyAction`].
pub fn build_graph(dag_id: &str, dag: &DagConfig, global: &DefaultSection) -> Result<Graph> {
    check_defaults(&format!("[dag.{dag_id}.default]"), &dag.default)?;

    let mut builder = GraphBuilder::new(dag_id);

    for (name, task) in dag.task.iter() {
        let section = format!("[dag.{dag_id}.task.{name}]");
        let options = resolve_options(&section, task, &dag.default, global)?;

        let action: Arc<dyn TaskAction> = match &task.cmd {
            Some(cmd) => Arc::new(CommandAction::new(cmd.clone())),
            None => Arc::new(EmptyAction),
        };

        let mut node = TaskNode::new(name.clone(), action).with_options(options);
        for dep in task.after.iter() {
            node = node.after(dep.clone());
        }
        builder.add_task(node);
    }

    builder.chain(&dag.chain).build()
}

/// Merge task settings over DAG defaults over global defaults.
fn resolve_options(
    section: &str,
    task: &TaskConfig,
    dag: &DefaultSection,
    global: &DefaultSection,
) -> Result<TaskOptions> {
    let retries = task.retries.or(dag.retries).or(global.retries).unwrap_or(0);

    let retry_delay = match task
        .retry_delay
        .as_ref()
        .or(dag.retry_delay.as_ref())
        .or(global.retry_delay.as_ref())
    {
        Some(s) => parse_duration_field(section, "retry_delay", s)?,
        None => Duration::ZERO,
    };

    let timeout = match task
        .timeout
        .as_ref()
        .or(dag.timeout.as_ref())
        .or(global.timeout.as_ref())
    {
        Some(s) => Some(parse_duration_field(section, "timeout", s)?),
        None => None,
    };

    let trigger_rule = task
        .trigger_rule
        .or(dag.trigger_rule)
        .or(global.trigger_rule)
        .unwrap_or_default();

    Ok(TaskOptions {
        retries,
        retry_delay,
        timeout,
        trigger_rule,
        params: task.params.clone(),
    })
}

fn parse_duration_field(section: &str, field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| DagflowError::ConfigError(format!("{section}.{field}: {e}")))
}

/// Parse durations like `"500ms"`, `"3s"`, `"2m"`, `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
