// src/engine/runner.rs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::{Registry, ScheduledTask, Scheduler};
use crate::engine::{RunReport, TaskCompletion, TaskName};
use crate::errors::{AssetdagError, Result};
use crate::exec::ExecutorBackend;

/// Runs tasks of a [`Registry`] with their prerequisites.
///
/// Holds no state across runs besides the run counter, so a run may be
/// repeated after a failure. Several runs may be in flight at once (watch
/// mode); each gets its own [`Scheduler`] and completion channel.
pub struct GraphRunner<E: ExecutorBackend> {
    registry: Arc<Registry>,
    executor: E,
    run_counter: AtomicU64,
}

impl<E: ExecutorBackend> fmt::Debug for GraphRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRunner")
            .field("tasks", &self.registry.len())
            .field("runs", &self.run_counter.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> GraphRunner<E> {
    pub fn new(registry: Arc<Registry>, executor: E) -> Self {
        Self {
            registry,
            executor,
            run_counter: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `task` after its transitive prerequisites.
    pub async fn run(&self, task: &str) -> Result<RunReport> {
        self.run_many(&[task.to_string()]).await
    }

    /// Run several roots as one run; shared prerequisites run once.
    ///
    /// Fails with a configuration error (unknown task, cycle) before anything
    /// starts, or with [`AssetdagError::TaskFailures`] listing every task that
    /// failed.
    pub async fn run_many(&self, roots: &[TaskName]) -> Result<RunReport> {
        let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut scheduler = Scheduler::plan(&self.registry, roots, run_id)?;

        let started = Instant::now();
        info!(run_id, roots = ?roots, tasks = scheduler.tasks_in_run().len(), "starting run");

        let (done_tx, mut done_rx) = mpsc::channel::<TaskCompletion>(64);

        let step = scheduler.start();
        self.dispatch(step.newly_scheduled, &done_tx).await?;

        while !scheduler.is_finished() {
            let Some(TaskCompletion { task, outcome }) = done_rx.recv().await else {
                return Err(AssetdagError::Other(anyhow!(
                    "executor dropped the completion channel of run {run_id}"
                )));
            };
            debug!(run_id, task = %task, "task completion received");
            let ready = scheduler.handle_completion(&task, outcome);
            self.dispatch(ready, &done_tx).await?;
        }

        let elapsed = started.elapsed();
        match scheduler.into_result() {
            Ok(completed) => {
                info!(
                    run_id,
                    roots = ?roots,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "run finished"
                );
                Ok(RunReport {
                    run_id,
                    roots: roots.to_vec(),
                    completed,
                    elapsed,
                })
            }
            Err(failures) => {
                error!(
                    run_id,
                    roots = ?roots,
                    failed = ?failures.tasks().collect::<Vec<_>>(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "run failed"
                );
                Err(AssetdagError::TaskFailures(failures))
            }
        }
    }

    async fn dispatch(
        &self,
        tasks: Vec<ScheduledTask>,
        done_tx: &mpsc::Sender<TaskCompletion>,
    ) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "dispatching ready tasks");
        self.executor.spawn_ready_tasks(tasks, done_tx.clone()).await
    }
}
