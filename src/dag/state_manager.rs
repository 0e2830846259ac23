// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Mutating view over the tasks of one run.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    /// Run order: every task after its prerequisites.
    order: &'a [TaskName],
    run_id: u64,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        order: &'a [TaskName],
        run_id: u64,
    ) -> Self {
        Self {
            graph,
            tasks,
            order,
            run_id,
        }
    }

    /// Collect `Pending` tasks whose prerequisites all succeeded, mark them
    /// `Running`, and return them in run order.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let candidates: Vec<TaskName> = {
            let ro = ReadOnlyStateManager::new(self.tasks);
            self.order
                .iter()
                .filter(|name| {
                    self.tasks.get(*name).is_some_and(|info| {
                        info.run_state == RunState::Pending && ro.deps_satisfied_for_info(info)
                    })
                })
                .cloned()
                .collect()
        };

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                debug!(
                    task = %info.name,
                    run_id = self.run_id,
                    "dependencies satisfied; marking Running"
                );
                info.run_state = RunState::Running;
                ready.push(ScheduledTask::from_task_info(info, self.run_id));
            }
        }
        ready
    }

    /// Mark every pending transitive dependent of a failed task `Skipped`.
    ///
    /// Returns the newly skipped tasks (the failed task itself excluded).
    pub fn mark_dependents_skipped(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut skipped = Vec::new();

        while let Some(name) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "node in DAG not present in tasks map");
                continue;
            };
            if info.run_state == RunState::Pending {
                info.run_state = RunState::Skipped;
                debug!(task = %info.name, upstream = %failed_task, "skipping dependent of failed task");
                skipped.push(info.name.clone());
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            }
        }
        skipped
    }

    /// Mark every remaining `Pending` task `Skipped`. Used once a run is
    /// halted and nothing is running any more.
    pub fn skip_all_pending(&mut self) -> Vec<TaskName> {
        let mut skipped = Vec::new();
        for name in self.order {
            if let Some(info) = self.tasks.get_mut(name) {
                if info.run_state == RunState::Pending {
                    info.run_state = RunState::Skipped;
                    skipped.push(name.clone());
                }
            }
        }
        if !skipped.is_empty() {
            info!(run_id = self.run_id, tasks = ?skipped, "run halted; tasks not started");
        }
        skipped
    }

    pub fn any_running(&self) -> bool {
        self.tasks.values().any(|info| info.run_state == RunState::Running)
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(TaskInfo::is_terminal)
    }
}

/// Read-only view for dependency checks with shared access to the tasks.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// All direct prerequisites of `info` succeeded in this run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| match self.tasks.get(dep_name) {
            Some(dep) => dep.run_state == RunState::DoneSuccess,
            None => {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                false
            }
        })
    }
}
