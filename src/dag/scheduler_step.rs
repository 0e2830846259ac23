// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// Tests use this to step a run by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// The task that failed in this step, if any.
    pub newly_failed: Vec<TaskName>,
    /// Tasks that will never start because of this step.
    pub newly_skipped: Vec<TaskName>,
    /// Whether this step finished the run (nothing pending or running).
    pub run_just_finished: bool,
}
