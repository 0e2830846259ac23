use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use assetdag::dag::ScheduledTask;
use assetdag::engine::{TaskCompletion, TaskOutcome};
use assetdag::errors::{Result, TransformError};
use assetdag::exec::ExecutorBackend;
use assetdag::types::BoxFuture;

/// What the fake saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Started(String),
    Finished(String),
}

/// A fake executor that:
/// - records when each scheduled task starts and finishes
/// - completes tasks after an optional delay
/// - fails the tasks it was told to fail
///
/// Clones share their records, so a test can keep one and hand the other to
/// the runner.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    events: Arc<Mutex<Vec<FakeEvent>>>,
    failing: Arc<HashSet<String>>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every run of `tasks`.
    pub fn failing(mut self, tasks: &[&str]) -> Self {
        self.failing = Arc::new(tasks.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Keep every task "running" for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of started tasks, in start order.
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Started(name) => Some(name),
                FakeEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn count(&self, task: &str) -> usize {
        self.executed().iter().filter(|t| *t == task).count()
    }

    /// Position of an event in the log.
    pub fn position(&self, event: &FakeEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &self,
        tasks: Vec<ScheduledTask>,
        done_tx: mpsc::Sender<TaskCompletion>,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            for t in tasks {
                self.events.lock().unwrap().push(FakeEvent::Started(t.name.clone()));

                let events = Arc::clone(&self.events);
                let fail = self.failing.contains(&t.name);
                let delay = self.delay;
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    events.lock().unwrap().push(FakeEvent::Finished(t.name.clone()));
                    let outcome = if fail {
                        TaskOutcome::Failed(TransformError::new("fake", format!("{} failed", t.name)))
                    } else {
                        TaskOutcome::Success
                    };
                    let _ = done_tx
                        .send(TaskCompletion {
                            task: t.name,
                            outcome,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }
}
