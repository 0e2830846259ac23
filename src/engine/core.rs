// src/engine/core.rs

//! Pure watch-mode state machine.
//!
//! [`WatchCore`] consumes [`WatchEvent`]s and produces [`CoreCommand`]s for
//! the async shell in [`crate::engine::runtime`]. It has no channels and no
//! Tokio types, so the coalescing rules are unit tested directly.
//!
//! Rules:
//! - a trigger whose task closure does not overlap any in-flight run starts
//!   a run right away;
//! - otherwise its tasks are queued in the [`TriggerQueue`] (depth 1 per
//!   task); a trigger for a task that is already queued adds nothing;
//! - when a run finishes, every queued task whose closure no longer overlaps
//!   an in-flight run starts; the rest stay queued.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::Registry;
use crate::engine::queue::TriggerQueue;
use crate::engine::{TaskName, WatchEvent};

/// Command produced by the core, executed by the async shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run `roots` through the graph runner and report back with
    /// `WatchEvent::RunFinished { batch_id }`.
    StartRun { batch_id: u64, roots: Vec<TaskName> },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    roots: Vec<TaskName>,
    /// Roots plus transitive prerequisites.
    tasks: BTreeSet<TaskName>,
}

#[derive(Debug)]
pub struct WatchCore {
    registry: Arc<Registry>,
    in_flight: BTreeMap<u64, InFlight>,
    queue: TriggerQueue,
    batch_counter: u64,
}

impl WatchCore {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            in_flight: BTreeMap::new(),
            queue: TriggerQueue::new(),
            batch_counter: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn step(&mut self, event: WatchEvent) -> CoreStep {
        match event {
            WatchEvent::Triggered { group, tasks } => self.handle_trigger(&group, tasks),
            WatchEvent::RunFinished { batch_id } => self.handle_finished(batch_id),
            WatchEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    fn handle_trigger(&mut self, group: &str, tasks: Vec<TaskName>) -> CoreStep {
        let (queued, fresh): (Vec<TaskName>, Vec<TaskName>) =
            tasks.into_iter().partition(|t| self.queue.contains(t));
        if !queued.is_empty() {
            debug!(group = %group, tasks = ?queued, "follow-up run already queued");
        }
        if fresh.is_empty() {
            return CoreStep::continue_with(Vec::new());
        }

        let Some(closure) = self.closure_of(&fresh) else {
            return CoreStep::continue_with(Vec::new());
        };

        if self.overlaps_in_flight(&closure) {
            info!(group = %group, tasks = ?fresh, "tasks already running; queueing one follow-up run");
            self.queue.record_trigger(&fresh);
            return CoreStep::continue_with(Vec::new());
        }

        debug!(group = %group, tasks = ?fresh, "trigger starts a run");
        CoreStep::continue_with(vec![self.start(fresh, closure)])
    }

    fn handle_finished(&mut self, batch_id: u64) -> CoreStep {
        match self.in_flight.remove(&batch_id) {
            Some(done) => debug!(batch_id, roots = ?done.roots, "watch run finished"),
            None => warn!(batch_id, "finish for unknown watch run; ignoring"),
        }

        if self.queue.is_empty() {
            return CoreStep::continue_with(Vec::new());
        }

        // Each queued task is released on its own; the ones no longer blocked
        // share one follow-up run.
        let mut ready = Vec::new();
        let mut ready_closure = BTreeSet::new();
        let mut blocked = Vec::new();
        for task in self.queue.drain_pending() {
            let Some(closure) = self.closure_of(std::slice::from_ref(&task)) else {
                continue;
            };
            if self.overlaps_in_flight(&closure) {
                blocked.push(task);
            } else {
                ready_closure.extend(closure);
                ready.push(task);
            }
        }
        if !blocked.is_empty() {
            self.queue.record_trigger(&blocked);
        }

        if ready.is_empty() {
            return CoreStep::continue_with(Vec::new());
        }
        info!(tasks = ?ready, still_queued = blocked.len(), "starting queued follow-up run");
        CoreStep::continue_with(vec![self.start(ready, ready_closure)])
    }

    fn start(&mut self, roots: Vec<TaskName>, tasks: BTreeSet<TaskName>) -> CoreCommand {
        self.batch_counter += 1;
        let batch_id = self.batch_counter;
        self.in_flight.insert(
            batch_id,
            InFlight {
                roots: roots.clone(),
                tasks,
            },
        );
        CoreCommand::StartRun { batch_id, roots }
    }

    fn closure_of(&self, roots: &[TaskName]) -> Option<BTreeSet<TaskName>> {
        match self.registry.closure(roots) {
            Ok(order) => Some(order.into_iter().collect()),
            Err(err) => {
                warn!(tasks = ?roots, error = %err, "ignoring trigger for invalid tasks");
                None
            }
        }
    }

    fn overlaps_in_flight(&self, closure: &BTreeSet<TaskName>) -> bool {
        self.in_flight
            .values()
            .any(|run| !run.tasks.is_disjoint(closure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Task;

    fn core() -> WatchCore {
        let registry = Registry::from_tasks([
            Task::new("lint"),
            Task::new("css"),
            Task::new("js").after(["lint"]),
            Task::new("vendorjs"),
            Task::new("test").after(["lint"]),
        ])
        .unwrap();
        WatchCore::new(Arc::new(registry))
    }

    fn trigger(tasks: &[&str]) -> WatchEvent {
        WatchEvent::Triggered {
            group: "g".into(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn started(step: &CoreStep) -> Vec<(u64, Vec<String>)> {
        step.commands
            .iter()
            .map(|CoreCommand::StartRun { batch_id, roots }| (*batch_id, roots.clone()))
            .collect()
    }

    #[test]
    fn second_trigger_while_running_queues_at_most_one_rerun() {
        let mut core = core();

        assert_eq!(started(&core.step(trigger(&["css"]))), vec![(1, vec!["css".into()])]);
        assert!(core.step(trigger(&["css"])).commands.is_empty());
        assert!(core.step(trigger(&["css"])).commands.is_empty());

        let step = core.step(WatchEvent::RunFinished { batch_id: 1 });
        assert_eq!(started(&step), vec![(2, vec!["css".into()])]);

        let step = core.step(WatchEvent::RunFinished { batch_id: 2 });
        assert!(step.commands.is_empty());
        assert!(core.is_idle());
        assert!(core.queue_is_empty());
    }

    #[test]
    fn unrelated_triggers_run_concurrently() {
        let mut core = core();
        core.step(trigger(&["css"]));
        let step = core.step(trigger(&["vendorjs"]));
        assert_eq!(started(&step), vec![(2, vec!["vendorjs".into()])]);
        assert_eq!(core.in_flight_count(), 2);
    }

    #[test]
    fn shared_prerequisite_serializes_runs() {
        let mut core = core();
        core.step(trigger(&["js"]));
        // `test` also needs `lint`, which is part of the running closure.
        assert!(core.step(trigger(&["test"])).commands.is_empty());

        let step = core.step(WatchEvent::RunFinished { batch_id: 1 });
        assert_eq!(started(&step), vec![(2, vec!["test".into()])]);
    }

    #[test]
    fn queued_task_is_not_held_back_by_an_unrelated_blocked_one() {
        let mut core = core();
        core.step(trigger(&["js"])); // batch 1: lint, js
        core.step(trigger(&["css"])); // batch 2: css
        assert!(core.step(trigger(&["test"])).commands.is_empty());
        assert!(core.step(trigger(&["css"])).commands.is_empty());

        // `css` is free once batch 2 is done even though `test` still waits on `lint`.
        let step = core.step(WatchEvent::RunFinished { batch_id: 2 });
        assert_eq!(started(&step), vec![(3, vec!["css".into()])]);
        assert!(!core.queue_is_empty());

        let step = core.step(WatchEvent::RunFinished { batch_id: 1 });
        assert_eq!(started(&step), vec![(4, vec!["test".into()])]);
        assert!(core.queue_is_empty());
    }

    #[test]
    fn trigger_for_a_queued_task_does_not_start_a_second_run() {
        let mut core = core();
        core.step(trigger(&["js"]));
        assert!(core.step(trigger(&["test"])).commands.is_empty());

        // Only `css` is new; `test` stays a single queued follow-up.
        let step = core.step(trigger(&["test", "css"]));
        assert_eq!(started(&step), vec![(2, vec!["css".into()])]);

        let step = core.step(WatchEvent::RunFinished { batch_id: 1 });
        assert_eq!(started(&step), vec![(3, vec!["test".into()])]);
        assert!(core.queue_is_empty());
        assert!(core.step(WatchEvent::RunFinished { batch_id: 3 }).commands.is_empty());
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = core();
        assert!(!core.step(WatchEvent::ShutdownRequested).keep_running);
    }
}
