// src/dag/graph.rs

//! Graph construction and validation.
//!
//! [`GraphBuilder`] collects task nodes and explicit dependency edges, then
//! [`GraphBuilder::build`] checks for duplicate ids, unknown dependencies and
//! cycles before producing an immutable [`Graph`] with a deterministic
//! topological order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::debug;

use crate::dag::task::TaskNode;
use crate::errors::{DagflowError, Result};
use crate::types::TaskId;

/// Collects tasks and edges for one DAG.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    id: String,
    nodes: Vec<TaskNode>,
    /// Extra `(upstream, downstream)` edges declared outside of the nodes.
    edges: Vec<(TaskId, TaskId)>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(mut self, node: TaskNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_task(&mut self, node: TaskNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Declare that `downstream` runs after `upstream` (`upstream >> downstream`).
    pub fn add_dependency(&mut self, upstream: impl Into<TaskId>, downstream: impl Into<TaskId>) -> &mut Self {
        self.edges.push((upstream.into(), downstream.into()));
        self
    }

    pub fn dependency(mut self, upstream: impl Into<TaskId>, downstream: impl Into<TaskId>) -> Self {
        self.add_dependency(upstream, downstream);
        self
    }

    /// Link tasks in sequence: `a >> b >> c`.
    pub fn chain<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        for pair in ids.windows(2) {
            self.add_dependency(pair[0].as_ref(), pair[1].as_ref());
        }
        self
    }

    /// Validate the collected tasks and produce an immutable [`Graph`].
    pub fn build(self) -> Result<Graph> {
        let graph_id = self.id;
        let mut nodes: BTreeMap<TaskId, TaskNode> = BTreeMap::new();

        for node in self.nodes {
            if nodes.contains_key(&node.id) {
                return Err(DagflowError::DuplicateTaskId {
                    graph: graph_id,
                    task: node.id,
                });
            }
            nodes.insert(node.id.clone(), node);
        }

        for (upstream, downstream) in self.edges {
            match nodes.get_mut(&downstream) {
                Some(node) => {
                    node.upstream.insert(upstream);
                }
                None => {
                    return Err(DagflowError::UnknownDependency {
                        graph: graph_id,
                        task: downstream,
                        dependency: upstream,
                    });
                }
            }
        }

        for node in nodes.values() {
            for dep in &node.upstream {
                if dep == &node.id {
                    return Err(DagflowError::DependencyCycle {
                        graph: graph_id,
                        cycle: vec![node.id.clone(), node.id.clone()],
                    });
                }
                if !nodes.contains_key(dep) {
                    return Err(DagflowError::UnknownDependency {
                        graph: graph_id,
                        task: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut downstream: BTreeMap<TaskId, BTreeSet<TaskId>> =
            nodes.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        for node in nodes.values() {
            for dep in &node.upstream {
                if let Some(children) = downstream.get_mut(dep) {
                    children.insert(node.id.clone());
                }
            }
        }

        if let Some(cycle) = find_cycle(&downstream) {
            return Err(DagflowError::DependencyCycle {
                graph: graph_id,
                cycle,
            });
        }

        let order = topological_order(&nodes, &downstream);
        debug!(dag = %graph_id, ?order, "graph validated");

        Ok(Graph::assemble(graph_id, nodes, downstream, order))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Depth-first search with visiting/visited marks.
///
/// Returns the first cycle found as a path whose first and last entries are
/// the same task. Nodes and edges are visited in lexical order so the
/// reported cycle is stable.
fn find_cycle(downstream: &BTreeMap<TaskId, BTreeSet<TaskId>>) -> Option<Vec<TaskId>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for start in downstream.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }

        // Explicit stack of (node, iterator over its children) to avoid
        // recursion depth limits on long chains.
        let mut path: Vec<&str> = vec![start.as_str()];
        let mut stack = vec![downstream[start].iter()];
        marks.insert(start.as_str(), Mark::Visiting);

        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(child) => match marks.get(child.as_str()) {
                    Some(Mark::Visiting) => {
                        let from = path.iter().position(|n| *n == child.as_str()).unwrap_or(0);
                        let mut cycle: Vec<TaskId> =
                            path[from..].iter().map(|s| s.to_string()).collect();
                        cycle.push(child.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Visited) => {}
                    None => {
                        marks.insert(child.as_str(), Mark::Visiting);
                        path.push(child.as_str());
                        stack.push(downstream[child].iter());
                    }
                },
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        marks.insert(done, Mark::Visited);
                    }
                }
            }
        }
    }

    None
}

/// Kahn's algorithm with an ordered ready set: among tasks whose upstream is
/// complete, the lexically smallest id is emitted first.
fn topological_order(
    nodes: &BTreeMap<TaskId, TaskNode>,
    downstream: &BTreeMap<TaskId, BTreeSet<TaskId>>,
) -> Vec<TaskId> {
    let mut in_degree: HashMap<&str, usize> = nodes
        .values()
        .map(|n| (n.id.as_str(), n.upstream.len()))
        .collect();

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        order.push(next.to_string());
        for child in &downstream[next] {
            if let Some(deg) = in_degree.get_mut(child.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(child.as_str());
                }
            }
        }
    }

    order
}

/// Validated, immutable DAG.
#[derive(Debug, Clone)]
pub struct Graph {
    id: String,
    nodes: BTreeMap<TaskId, TaskNode>,
    /// Forward edges, `upstream -> downstream`.
    downstream: BTreeMap<TaskId, Vec<TaskId>>,
    order: Vec<TaskId>,
    edges: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
}

impl Graph {
    fn assemble(
        id: String,
        nodes: BTreeMap<TaskId, TaskNode>,
        downstream: BTreeMap<TaskId, BTreeSet<TaskId>>,
        order: Vec<TaskId>,
    ) -> Self {
        let mut edges = DiGraph::with_capacity(nodes.len(), downstream.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for name in &order {
            index.insert(name.clone(), edges.add_node(name.clone()));
        }
        for (from, children) in &downstream {
            for to in children {
                edges.add_edge(index[from], index[to], ());
            }
        }

        let downstream = downstream
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();

        Self {
            id,
            nodes,
            downstream,
            order,
            edges,
            index,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task ids in topological order (ties broken lexically).
    pub fn topological_order(&self) -> &[TaskId] {
        &self.order
    }

    /// Task nodes in topological order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Tasks without upstream dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.edges
            .externals(Direction::Incoming)
            .map(|ix| self.edges[ix].as_str())
    }

    /// Immediate upstream dependencies of a task.
    pub fn upstream_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|n| n.upstream.iter().map(String::as_str))
    }

    /// Immediate downstream dependents of a task.
    pub fn downstream_of(&self, id: &str) -> &[TaskId] {
        self.downstream
            .get(id)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Every task reachable downstream of `id` (excluding `id` itself).
    pub fn descendants_of(&self, id: &str) -> BTreeSet<TaskId> {
        let mut out = BTreeSet::new();
        let Some(&start) = self.index.get(id) else {
            return out;
        };

        let mut dfs = Dfs::new(&self.edges, start);
        while let Some(ix) = dfs.next(&self.edges) {
            if ix != start {
                out.insert(self.edges[ix].clone());
            }
        }
        out
    }
}
