#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dagflow::dag::{Graph, ScheduledTask, Scheduler};
use dagflow::registry::DagRegistry;
use dagflow::state::{MemoryStateStore, RunKey};
use dagflow_test_utils::logical_date;

pub fn date() -> DateTime<Utc> {
    logical_date(2024, 1, 1)
}

pub fn key(dag: &str) -> RunKey {
    RunKey::new(dag, date())
}

pub fn registry_of(graphs: Vec<Graph>) -> Arc<DagRegistry> {
    let mut registry = DagRegistry::new();
    for graph in graphs {
        registry.register(graph).unwrap();
    }
    Arc::new(registry)
}

/// Scheduler over an in-memory store.
pub fn scheduler_for(graphs: Vec<Graph>, parallelism: usize) -> Scheduler {
    Scheduler::new(
        registry_of(graphs),
        Box::new(MemoryStateStore::new()),
        parallelism,
    )
}

pub fn names(tasks: &[ScheduledTask]) -> Vec<String> {
    tasks.iter().map(|t| t.name.clone()).collect()
}
