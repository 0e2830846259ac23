// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::{AssetdagError, Result};
use crate::paths::path_utils::relative_str;
use crate::paths::CompiledPathSet;
use crate::types::ChangeKind;
use crate::watch::debounce::ChangeBuffer;
use crate::watch::group::{ChangeBatch, FileChange};

/// Handle for one filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle stops
/// watching and ends the event loop.
pub struct WatcherHandle {
    name: String,
    _inner: RecommendedWatcher,
}

impl WatcherHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").field("name", &self.name).finish()
    }
}

/// Keep only base directories not already covered by a shorter one, since
/// each is watched recursively.
fn minimal_bases(mut bases: Vec<PathBuf>) -> Vec<PathBuf> {
    bases.sort_by_key(|b| b.components().count());
    let mut kept: Vec<PathBuf> = Vec::new();
    for base in bases {
        if !kept.iter().any(|k| base.starts_with(k)) {
            kept.push(base);
        }
    }
    kept
}

/// Watch `paths` under `root` and send a [`ChangeBatch`] per debounce window.
///
/// Only the literal base directories of the path set's globs are observed,
/// recursively. Every event is matched against the full path set, so a
/// batch only ever contains files of this set.
///
/// Fails with [`AssetdagError::Watch`] when a base directory does not exist
/// or cannot be observed; that is fatal to this watcher only.
pub fn watch(
    root: &Path,
    name: &str,
    paths: CompiledPathSet,
    debounce: Duration,
    batch_tx: mpsc::Sender<ChangeBatch>,
) -> Result<WatcherHandle> {
    let watch_err = |reason: String| AssetdagError::Watch {
        group: name.to_string(),
        reason,
    };

    // Canonicalize once so event paths share the root's prefix.
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let bases = minimal_bases(paths.base_dirs());

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();

    // Called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let group = name.to_string();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // The receiver is gone once the loop ended; nothing to do.
                    let _ = raw_tx.send(event);
                }
                Err(err) => warn!(group = %group, error = %err, "file watch error"),
            }
        },
        Config::default(),
    )
    .map_err(|e| watch_err(format!("creating watcher: {e}")))?;

    for base in &bases {
        let dir = root.join(base);
        if !dir.is_dir() {
            return Err(watch_err(format!("path does not exist: {}", dir.display())));
        }
        watcher
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| watch_err(format!("watching {}: {e}", dir.display())))?;
        debug!(group = %name, dir = %dir.display(), "watching directory");
    }

    info!(group = %name, dirs = bases.len(), debounce_ms = debounce.as_millis() as u64, "file watcher started");

    let group = name.to_string();
    tokio::spawn(async move {
        let mut buffer = ChangeBuffer::new();

        while let Some(event) = raw_rx.recv().await {
            collect(&root, &paths, &event, &mut buffer);
            if buffer.is_empty() {
                continue;
            }

            // First relevant event opens the window; everything until the
            // deadline joins the same batch.
            let deadline = sleep(debounce);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = raw_rx.recv() => match next {
                        Some(event) => collect(&root, &paths, &event, &mut buffer),
                        None => break,
                    },
                }
            }

            let changes = buffer.take();
            debug!(group = %group, changes = changes.len(), "debounced change batch");
            let batch = ChangeBatch {
                group: group.clone(),
                changes,
            };
            if batch_tx.send(batch).await.is_err() {
                debug!(group = %group, "batch receiver dropped; stopping watcher loop");
                break;
            }
        }
        debug!(group = %group, "watcher event loop finished");
    });

    Ok(WatcherHandle {
        name: name.to_string(),
        _inner: watcher,
    })
}

fn collect(root: &Path, paths: &CompiledPathSet, event: &Event, buffer: &mut ChangeBuffer) {
    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
        return;
    };
    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            continue;
        };
        if paths.matches(&rel) {
            buffer.push(FileChange::new(rel, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_bases_are_dropped() {
        let bases = vec![
            PathBuf::from("client/app"),
            PathBuf::from("client"),
            PathBuf::from("server"),
            PathBuf::from("client/content"),
        ];
        assert_eq!(
            minimal_bases(bases),
            vec![PathBuf::from("client"), PathBuf::from("server")]
        );
    }

    #[test]
    fn root_base_covers_everything() {
        let bases = vec![PathBuf::from("server"), PathBuf::new()];
        assert_eq!(minimal_bases(bases), vec![PathBuf::new()]);
    }
}
