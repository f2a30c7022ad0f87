// src/state/memory.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::Graph;
use crate::errors::{DagflowError, Result};
use crate::state::{RunInstance, RunKey, StateStore, TaskInstance};

/// In-memory run state, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    runs: BTreeMap<RunKey, RunInstance>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            runs: BTreeMap::new(),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn create(&mut self, graph: &Graph, logical_date: DateTime<Utc>) -> Result<RunInstance> {
        let run = RunInstance::new(graph, logical_date);

        if self.runs.contains_key(&run.key) {
            return Err(DagflowError::RunAlreadyExists {
                graph: run.key.dag_id.clone(),
                logical_date: run.key.date_string(),
            });
        }

        debug!(run = %run.key, tasks = run.tasks.len(), "created run in memory");
        self.runs.insert(run.key.clone(), run.clone());
        Ok(run)
    }

    fn load(&self, key: &RunKey) -> Result<RunInstance> {
        self.runs.get(key).cloned().ok_or_else(|| key.not_found())
    }

    fn set(&mut self, key: &RunKey, task: &str, instance: TaskInstance) -> Result<()> {
        let run = self.runs.get_mut(key).ok_or_else(|| key.not_found())?;
        run.apply(task, instance)
    }

    fn mark_cancelled(&mut self, key: &RunKey) -> Result<()> {
        let run = self.runs.get_mut(key).ok_or_else(|| key.not_found())?;
        run.cancelled = true;
        Ok(())
    }

    fn runs(&self) -> Result<Vec<RunKey>> {
        Ok(self.runs.keys().cloned().collect())
    }
}
