// src/dag/graph.rs

use std::collections::HashMap;

use crate::dag::registry::Registry;
use crate::engine::TaskName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// Adjacency of the tasks taking part in one run, keyed by task name.
///
/// Built from an already planned closure, so every dependency is present and
/// the graph is acyclic.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build the sub-graph of `registry` spanned by `names`.
    pub fn from_registry(registry: &Registry, names: &[TaskName]) -> Self {
        let mut nodes: HashMap<TaskName, DagNode> = names
            .iter()
            .map(|name| {
                let deps = registry
                    .prerequisites_of(name)
                    .map(<[TaskName]>::to_vec)
                    .unwrap_or_default();
                (
                    name.clone(),
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        // Populate dependents in run order so they come out deterministic.
        for name in names {
            let deps = nodes.get(name).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Immediate dependencies of a task (its prerequisites).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task within this run.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
