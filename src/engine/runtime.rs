// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::core::WatchCore;
use crate::engine::runner::GraphRunner;
use crate::engine::{CoreCommand, WatchEvent};
use crate::errors::{AssetdagError, Result};
use crate::exec::ExecutorBackend;

/// Async shell around [`WatchCore`].
///
/// Reads [`WatchEvent`]s (from the watchers, from finished runs, from
/// Ctrl-C), feeds them to the core, and starts the runs it asks for on the
/// shared [`GraphRunner`]. A failed run is logged; watching continues.
pub struct WatchRuntime<E: ExecutorBackend + 'static> {
    core: WatchCore,
    runner: Arc<GraphRunner<E>>,
    event_rx: mpsc::Receiver<WatchEvent>,
    event_tx: mpsc::Sender<WatchEvent>,
}

impl<E: ExecutorBackend + 'static> fmt::Debug for WatchRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend + 'static> WatchRuntime<E> {
    /// `event_tx` must be the sending half of `event_rx`; finished runs
    /// report back through it.
    pub fn new(
        core: WatchCore,
        runner: Arc<GraphRunner<E>>,
        event_rx: mpsc::Receiver<WatchEvent>,
        event_tx: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            core,
            runner,
            event_rx,
            event_tx,
        }
    }

    /// Main event loop. Returns on `ShutdownRequested` or when every sender
    /// is gone.
    pub async fn run(mut self) -> Result<()> {
        info!("watch runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "watch runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute(command);
            }

            if !step.keep_running {
                info!("shutdown requested; stopping watch runtime");
                break;
            }
        }

        info!("watch runtime exiting");
        Ok(())
    }

    fn execute(&self, command: CoreCommand) {
        match command {
            CoreCommand::StartRun { batch_id, roots } => {
                let runner = Arc::clone(&self.runner);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    match runner.run_many(&roots).await {
                        Ok(report) => info!(
                            batch_id,
                            roots = ?roots,
                            tasks = report.completed.len(),
                            "rebuild succeeded"
                        ),
                        Err(AssetdagError::TaskFailures(failures)) => {
                            error!(batch_id, roots = ?roots, "rebuild failed: {failures}")
                        }
                        Err(err) => error!(batch_id, roots = ?roots, error = %err, "rebuild failed"),
                    }
                    let _ = tx.send(WatchEvent::RunFinished { batch_id }).await;
                });
            }
        }
    }
}
