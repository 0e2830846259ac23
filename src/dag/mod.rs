// src/dag/mod.rs

//! Task registry, planning and per-run scheduling.
//!
//! - [`registry`] holds the tasks and validates the prerequisite graph.
//! - [`plan`] computes the depth-first closure of requested tasks and
//!   detects cycles.
//! - [`graph`] keeps the adjacency of the tasks in one run.
//! - [`scheduler`] is the per-run state machine that decides which tasks are
//!   ready, and halts the run after a failure.
//! - [`task_info`] and [`scheduler_step`] are its state and result types.
//! - [`state_manager`] implements the state transitions.

pub mod graph;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use registry::{Registry, Task, TaskAction};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
