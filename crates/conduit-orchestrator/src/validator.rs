//! Structural validation for task graphs.
//!
//! Checks unique ids, resolvable dependencies and acyclicity before a graph is handed
//! to the executor. Validation never fails: problems are collected into a
//! [`ValidationReport`].

use crate::graph::TaskGraph;
use petgraph::Direction;
use petgraph::graph::{DiGraph, Neighbors, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Outcome of validating a task graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `true` when no errors were found.
    pub valid: bool,
    /// Human-readable problems, in discovery order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self { valid: errors.is_empty(), errors }
    }
}

/// Dependency graph over task ids. Edges point from a dependency to its dependent.
struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph, recording duplicate, self and dangling references in `errors`.
    fn build(task_graph: &TaskGraph, errors: &mut Vec<String>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut reported = HashSet::new();

        // First pass: one node per distinct id
        for (idx, task) in task_graph.tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                errors.push(format!("task at index {} has an empty id", idx));
                continue;
            }
            if node_map.contains_key(&task.id) {
                if reported.insert(task.id.clone()) {
                    errors.push(format!("duplicate task id: {}", task.id));
                }
                continue;
            }
            let node = graph.add_node(task.id.clone());
            node_map.insert(task.id.clone(), node);
        }

        // Second pass: dependency edges
        for task in &task_graph.tasks {
            let Some(&to_node) = node_map.get(&task.id) else {
                continue;
            };
            for dep_id in &task.dependencies {
                if dep_id == &task.id {
                    errors.push(format!("task '{}' depends on itself", task.id));
                    continue;
                }
                match node_map.get(dep_id) {
                    Some(&from_node) => {
                        graph.update_edge(from_node, to_node, ());
                    }
                    None => errors.push(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep_id
                    )),
                }
            }
        }

        Self { graph, node_map }
    }

    /// Returns one cycle as `a -> b -> a`, if the graph has any.
    fn find_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        for node in self.graph.node_indices() {
            if visited.contains(&node) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(node, &mut visited) {
                return Some(
                    cycle.iter().map(|idx| self.graph[*idx].as_str()).collect::<Vec<_>>().join(" -> "),
                );
            }
        }

        None
    }

    /// Depth-first search from `root` with an explicit stack, so chain depth is bounded
    /// by the heap rather than the thread stack.
    fn dfs_cycle(&self, root: NodeIndex, visited: &mut HashSet<NodeIndex>) -> Option<Vec<NodeIndex>> {
        let mut on_stack = HashSet::from([root]);
        let mut path = vec![root];
        let mut stack: Vec<(NodeIndex, Neighbors<'_, ()>)> =
            vec![(root, self.graph.neighbors_directed(root, Direction::Outgoing))];
        visited.insert(root);

        while let Some((_, neighbors)) = stack.last_mut() {
            match neighbors.next() {
                Some(next) if on_stack.contains(&next) => {
                    let start = path.iter().position(|n| *n == next).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Some(next) => {
                    if visited.insert(next) {
                        on_stack.insert(next);
                        path.push(next);
                        stack.push((next, self.graph.neighbors_directed(next, Direction::Outgoing)));
                    }
                }
                None => {
                    if let Some((node, _)) = stack.pop() {
                        on_stack.remove(&node);
                        path.pop();
                    }
                }
            }
        }

        None
    }

    /// Groups nodes into rounds: level 0 has no dependencies, level N+1 depends on level N.
    fn levels(&self, order: &[String]) -> Vec<Vec<String>> {
        let position: HashMap<NodeIndex, usize> = order
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| self.node_map.get(id).map(|n| (*n, pos)))
            .collect();
        let mut remaining: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: Vec<NodeIndex> =
            remaining.iter().filter(|(_, count)| **count == 0).map(|(n, _)| *n).collect();
        let mut levels = Vec::new();

        while !ready.is_empty() {
            ready.sort_by_key(|n| position.get(n).copied().unwrap_or(usize::MAX));
            let mut next = Vec::new();
            for node in &ready {
                for dependent in self.graph.neighbors_directed(*node, Direction::Outgoing) {
                    if let Some(count) = remaining.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            levels.push(ready.iter().map(|n| self.graph[*n].clone()).collect());
            ready = next;
        }

        levels
    }
}

/// Validates a task graph.
pub fn validate(graph: &TaskGraph) -> ValidationReport {
    let mut errors = Vec::new();
    let dag = DependencyGraph::build(graph, &mut errors);

    if let Some(cycle) = dag.find_cycle() {
        errors.push(format!("circular dependency detected: {}", cycle));
    }

    ValidationReport::from_errors(errors)
}

/// Returns the rounds a valid graph executes in, or `None` if the graph is invalid.
///
/// Tasks within a level keep the graph's task order.
pub fn execution_levels(graph: &TaskGraph) -> Option<Vec<Vec<String>>> {
    let mut errors = Vec::new();
    let dag = DependencyGraph::build(graph, &mut errors);
    if !errors.is_empty() || dag.find_cycle().is_some() {
        return None;
    }

    let order: Vec<String> = graph.tasks.iter().map(|t| t.id.clone()).collect();
    Some(dag.levels(&order))
}
