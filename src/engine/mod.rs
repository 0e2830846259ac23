// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`runner`] is the task graph runner: it plans a run with the pure
//!   [`crate::dag::Scheduler`] and drives it against an
//!   [`crate::exec::ExecutorBackend`].
//! - [`core`] is the pure watch-mode state machine that decides when a
//!   trigger starts a run and when it has to wait (depth-1 coalescing per
//!   task, backed by [`queue::TriggerQueue`]).
//! - [`runtime`] is the async shell around [`core`], fed by the watchers.

use std::time::Duration;

use crate::errors::TransformError;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(TransformError),
}

/// Sent by the executor when a task of a run finished.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task: TaskName,
    pub outcome: TaskOutcome,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub roots: Vec<TaskName>,
    /// Tasks in completion order.
    pub completed: Vec<TaskName>,
    pub elapsed: Duration,
}

/// Events flowing into the watch runtime.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A watch group saw changes to its path set.
    Triggered { group: String, tasks: Vec<TaskName> },
    /// A run started by the runtime finished (successfully or not).
    RunFinished { batch_id: u64 },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod queue;
pub mod runner;
pub mod runtime;

pub use core::{CoreCommand, CoreStep, WatchCore};
pub use queue::TriggerQueue;
pub use runner::GraphRunner;
pub use runtime::WatchRuntime;
