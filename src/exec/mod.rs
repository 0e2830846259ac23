// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests replace it with a fake.
//! - [`task_runner`] runs one scheduled task and reports its completion.
//! - [`pipeline`] is the task body built from configured transform steps.

pub mod backend;
pub mod pipeline;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use pipeline::StepPipeline;
