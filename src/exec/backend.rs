// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runner talks to an `ExecutorBackend` instead of running actions
//! itself. Production uses [`RealExecutorBackend`], which runs each task's
//! transform steps in its own Tokio task; tests swap in a fake that records
//! which tasks were scheduled and completes them on its own terms.

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::TaskCompletion;
use crate::errors::Result;
use crate::exec::task_runner::run_task;
use crate::transform::StepContext;
use crate::types::BoxFuture;

/// How scheduled tasks are executed.
///
/// Implementations must eventually send one [`TaskCompletion`] per task on
/// `done_tx`; the runner waits for them.
pub trait ExecutorBackend: Send + Sync {
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        done_tx: mpsc::Sender<TaskCompletion>,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Executor used in production: one Tokio task per scheduled task, so
/// independent tasks run concurrently.
#[derive(Debug, Clone)]
pub struct RealExecutorBackend {
    ctx: StepContext,
}

impl RealExecutorBackend {
    pub fn new(ctx: StepContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &StepContext {
        &self.ctx
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        done_tx: mpsc::Sender<TaskCompletion>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = self.ctx.clone();
        Box::pin(async move {
            for task in tasks {
                tokio::spawn(run_task(task, ctx.clone(), done_tx.clone()));
            }
            Ok(())
        })
    }
}
