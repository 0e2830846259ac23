// src/exec/task_runner.rs

//! Runs a single scheduled task and reports its completion.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{TaskCompletion, TaskOutcome};
use crate::errors::TransformError;
use crate::transform::StepContext;

/// Run a task's action and send exactly one [`TaskCompletion`].
///
/// The action runs in its own Tokio task so a panicking step turns into a
/// failed completion instead of a run that never finishes.
pub async fn run_task(task: ScheduledTask, ctx: StepContext, done_tx: mpsc::Sender<TaskCompletion>) {
    let started = Instant::now();
    info!(task = %task.name, run_id = task.run_id, "starting task");

    let outcome = match task.action.clone() {
        None => TaskOutcome::Success,
        Some(action) => {
            let name = task.name.clone();
            let handle = tokio::spawn(async move { action.run(&name, &ctx).await });
            match handle.await {
                Ok(Ok(())) => TaskOutcome::Success,
                Ok(Err(err)) => TaskOutcome::Failed(err),
                Err(join_err) => TaskOutcome::Failed(TransformError::new(
                    "task",
                    format!("task panicked: {join_err}"),
                )),
            }
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        TaskOutcome::Success => {
            info!(task = %task.name, run_id = task.run_id, elapsed_ms, "finished task")
        }
        TaskOutcome::Failed(err) => error!(
            task = %task.name,
            run_id = task.run_id,
            elapsed_ms,
            error = %err,
            "task failed"
        ),
    }

    let completion = TaskCompletion {
        task: task.name,
        outcome,
    };
    if done_tx.send(completion).await.is_err() {
        warn!(run_id = task.run_id, "runner went away; completion dropped");
    }
}
