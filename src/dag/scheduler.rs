// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::registry::Registry;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::{ConfigurationError, FailureList, TaskFailure};

/// Pure state machine for a single run of the task graph.
///
/// It is responsible for:
/// - planning the closure of the requested tasks (unknown names and cycles
///   are rejected here, before anything starts)
/// - deciding when a task is ready (all prerequisites succeeded)
/// - recording successes and failures
/// - halting the run after a failure: running tasks finish, nothing new
///   starts, and whatever is left ends up `Skipped`
///
/// It performs no I/O; the async shell in `engine::runner` feeds it.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Every task of the run, each after its prerequisites.
    order: Vec<TaskName>,
    run_id: u64,
    halted: bool,
    finished: bool,
    completed: Vec<TaskName>,
    failures: Vec<TaskFailure>,
}

impl Scheduler {
    /// Plan a run of `roots` and their transitive prerequisites.
    pub fn plan(
        registry: &Registry,
        roots: &[TaskName],
        run_id: u64,
    ) -> Result<Self, ConfigurationError> {
        let order = registry.closure(roots)?;
        let graph = DagGraph::from_registry(registry, &order);

        let tasks = order
            .iter()
            .map(|name| {
                let info = TaskInfo {
                    name: name.clone(),
                    deps: graph.dependencies_of(name).to_vec(),
                    action: registry.get(name).and_then(|t| t.action.clone()),
                    run_state: RunState::Pending,
                };
                (name.clone(), info)
            })
            .collect();

        debug!(run_id, tasks = ?order, "planned run");

        Ok(Self {
            graph,
            tasks,
            order,
            run_id,
            halted: false,
            finished: false,
            completed: Vec::new(),
            failures: Vec::new(),
        })
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Tasks taking part in this run, prerequisites first.
    pub fn tasks_in_run(&self) -> &[TaskName] {
        &self.order
    }

    pub fn run_state_of(&self, task: &str) -> TaskRunState {
        self.tasks.get(task).map(|info| info.run_state).into()
    }

    /// Whether the prerequisites of `task` all succeeded. `None` if the task
    /// is not part of this run.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tasks that succeeded, in completion order.
    pub fn completed(&self) -> &[TaskName] {
        &self.completed
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.failures
    }

    /// Schedule the tasks without prerequisites.
    pub fn start(&mut self) -> SchedulerStep {
        let mut manager = StateManager::new(&self.graph, &mut self.tasks, &self.order, self.run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();
        SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    /// Production API: record a completion, return the tasks to launch.
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.step_completion(task, outcome).newly_scheduled
    }

    /// Record a completion and return everything that changed.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        if self.finished {
            warn!(task = %task, run_id = self.run_id, "completion after run finished; ignoring");
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep::default();

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for task outside this run; ignoring");
            return step;
        };
        if info.run_state != RunState::Running {
            warn!(task = %task, state = ?info.run_state, "completion for task that is not running; ignoring");
            return step;
        }

        match outcome {
            TaskOutcome::Success => {
                info.run_state = RunState::DoneSuccess;
                self.completed.push(info.name.clone());
                if !self.halted {
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, &self.order, self.run_id);
                    step.newly_scheduled = manager.collect_new_ready_tasks();
                }
            }
            TaskOutcome::Failed(error) => {
                info.run_state = RunState::DoneFailed;
                warn!(
                    task = %info.name,
                    run_id = self.run_id,
                    error = %error,
                    "task failed; halting run"
                );
                step.newly_failed.push(info.name.clone());
                self.failures.push(TaskFailure {
                    task: info.name.clone(),
                    error,
                });
                self.halted = true;

                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, &self.order, self.run_id);
                step.newly_skipped = manager.mark_dependents_skipped(task);
            }
        }

        if self.halted {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, &self.order, self.run_id);
            if !manager.any_running() {
                step.newly_skipped.extend(manager.skip_all_pending());
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Outcome of a finished run: the completed tasks, or every failure.
    pub fn into_result(self) -> Result<Vec<TaskName>, FailureList> {
        if self.failures.is_empty() {
            Ok(self.completed)
        } else {
            Err(FailureList(self.failures))
        }
    }

    fn maybe_finish_run(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let manager = StateManager::new(&self.graph, &mut self.tasks, &self.order, self.run_id);
        if manager.all_tasks_terminal() {
            info!(
                run_id = self.run_id,
                failed = self.failures.len(),
                "scheduler: all tasks terminal; run finished"
            );
            self.finished = true;
            true
        } else {
            false
        }
    }
}
