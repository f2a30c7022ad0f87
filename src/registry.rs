// src/registry.rs

//! Explicit collection of validated graphs, handed to the scheduler at
//! construction instead of living in a process-wide registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dag::Graph;
use crate::errors::{DagflowError, Result};

#[derive(Debug, Clone, Default)]
pub struct DagRegistry {
    dags: BTreeMap<String, Arc<Graph>>,
}

impl DagRegistry {
    pub fn new() -> Self {
        Self {
            dags: BTreeMap::new(),
        }
    }

    /// Add a graph; DAG ids must be unique.
    pub fn register(&mut self, graph: Graph) -> Result<()> {
        if self.dags.contains_key(graph.id()) {
            return Err(DagflowError::ConfigError(format!(
                "DAG '{}' is registered twice",
                graph.id()
            )));
        }
        self.dags.insert(graph.id().to_string(), Arc::new(graph));
        Ok(())
    }

    pub fn get(&self, dag_id: &str) -> Result<Arc<Graph>> {
        self.dags
            .get(dag_id)
            .cloned()
            .ok_or_else(|| DagflowError::UnknownDag(dag_id.to_string()))
    }

    /// DAG ids in lexical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dags.keys().map(String::as_str)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.dags.values().map(|g| g.as_ref())
    }

    pub fn len(&self) -> usize {
        self.dags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dags.is_empty()
    }
}
