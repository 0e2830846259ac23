// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use crate::engine::TaskName;

/// Triggers that arrived while an overlapping run was in flight.
///
/// The queue is a set of root tasks, so it has depth 1 per task: however
/// many times `css` is re-triggered while a run containing `css` executes,
/// exactly one follow-up run of `css` is remembered.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    pending: BTreeSet<TaskName>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.pending.contains(task)
    }

    /// Remember `tasks` for the follow-up run. Returns the tasks that were not
    /// already queued.
    pub fn record_trigger(&mut self, tasks: &[TaskName]) -> Vec<TaskName> {
        let added: Vec<TaskName> = tasks
            .iter()
            .filter(|t| self.pending.insert((*t).clone()))
            .cloned()
            .collect();
        debug!(
            added = ?added,
            queued = self.pending.len(),
            "coalesced trigger into queued follow-up run"
        );
        added
    }

    /// Take every queued task for a new run.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let tasks: Vec<TaskName> = std::mem::take(&mut self.pending).into_iter().collect();
        debug!(drained = tasks.len(), "drained queued triggers into new run");
        tasks
    }
}
