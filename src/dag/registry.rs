// src/dag/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::plan::closure;
use crate::engine::TaskName;
use crate::errors::{ConfigurationError, TransformError};
use crate::transform::StepContext;
use crate::types::BoxFuture;

/// The body of a task: what runs once every prerequisite succeeded.
pub trait TaskAction: Send + Sync + fmt::Debug {
    fn run<'a>(&'a self, task: &'a str, ctx: &'a StepContext) -> BoxFuture<'a, Result<(), TransformError>>;
}

/// A named unit of work with ordered prerequisites.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    pub prerequisites: Vec<TaskName>,
    pub action: Option<Arc<dyn TaskAction>>,
    pub description: Option<String>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

impl Task {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
            action: None,
            description: None,
        }
    }

    pub fn after<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.prerequisites.extend(prerequisites.into_iter().map(Into::into));
        self
    }

    pub fn with_action(mut self, action: Arc<dyn TaskAction>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// All known tasks, by name. Built once at startup and handed to the runner.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: BTreeMap<TaskName, Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry and validate it.
    pub fn from_tasks<I>(tasks: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut registry = Self::new();
        for task in tasks {
            registry.insert(task)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn insert(&mut self, task: Task) -> Result<(), ConfigurationError> {
        if self.tasks.contains_key(&task.name) {
            return Err(ConfigurationError::Invalid(format!(
                "task '{}' is defined twice",
                task.name
            )));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|k| k.as_str())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Direct prerequisites of `name`, or `None` for an unknown task.
    pub fn prerequisites_of(&self, name: &str) -> Option<&[TaskName]> {
        self.tasks.get(name).map(|t| t.prerequisites.as_slice())
    }

    /// Every prerequisite exists and the graph is acyclic.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for (name, task) in &self.tasks {
            graph.add_node(name.as_str());
            for dep in &task.prerequisites {
                if !self.tasks.contains_key(dep) {
                    return Err(ConfigurationError::UnknownTask(dep.clone()));
                }
                if dep == name {
                    return Err(ConfigurationError::CyclicDependency(vec![
                        name.clone(),
                        name.clone(),
                    ]));
                }
                // Edge dep -> task: dep must run before task.
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let start = cycle.node_id().to_string();
            // Walk from the offending node to report the actual path.
            return match closure(&[start.clone()], |n| self.prerequisites_of(n)) {
                Err(err) => Err(err),
                Ok(_) => Err(ConfigurationError::CyclicDependency(vec![start])),
            };
        }

        Ok(())
    }

    /// Transitive prerequisites of `roots` (roots included), prerequisites
    /// first.
    pub fn closure(&self, roots: &[TaskName]) -> Result<Vec<TaskName>, ConfigurationError> {
        closure(roots, |n| self.prerequisites_of(n))
    }
}
