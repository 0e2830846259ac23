// src/watch/mod.rs

//! File watching.
//!
//! - [`watcher`] observes one path set with `notify` and emits debounced
//!   [`ChangeBatch`]es.
//! - [`debounce`] folds the events of one window into one change per path.
//! - [`group`] defines watch groups and change types.
//!
//! Watchers know nothing about tasks; [`spawn_group_watchers`] turns batches
//! into [`WatchEvent::Triggered`] for the engine.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::engine::WatchEvent;

pub mod debounce;
pub mod group;
pub mod watcher;

pub use group::{ChangeBatch, FileChange, WatchGroup};
pub use watcher::{watch, WatcherHandle};

/// Start one watcher per group, each feeding `event_tx`.
///
/// A group whose watcher cannot start is logged and left out; the others keep
/// running. The failures are returned alongside the live handles.
pub fn spawn_group_watchers(
    root: &Path,
    groups: &[WatchGroup],
    debounce: Duration,
    event_tx: mpsc::Sender<WatchEvent>,
) -> (Vec<WatcherHandle>, Vec<crate::errors::AssetdagError>) {
    let mut handles = Vec::new();
    let mut failures = Vec::new();

    for group in groups {
        let (batch_tx, mut batch_rx) = mpsc::channel::<ChangeBatch>(16);
        match watch(root, &group.name, group.paths.clone(), debounce, batch_tx) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                error!(group = %group.name, error = %err, "watch group disabled");
                failures.push(err);
                continue;
            }
        }

        let tasks = group.tasks.clone();
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                for change in &batch.changes {
                    info!(
                        group = %batch.group,
                        path = %change.path,
                        kind = change.kind.as_str(),
                        "file changed"
                    );
                }
                let event = WatchEvent::Triggered {
                    group: batch.group,
                    tasks: tasks.clone(),
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    (handles, failures)
}
