// src/livereload/mod.rs

//! Live-reload notifier.
//!
//! Browsers subscribe over Server-Sent Events ([`server`]); a watcher on the
//! served directory calls [`ReloadClientSet::notify`] for every changed file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::errors::Result;
use crate::paths::CompiledPathSet;
use crate::watch::{watch, ChangeBatch, WatcherHandle};

pub mod clients;
pub mod server;

pub use clients::{ClientId, ReloadClientSet};

/// Watch `served` (relative to `root`) and push every change to `clients`.
///
/// Paths sent to clients are relative to the served directory.
pub fn watch_served_dir(
    root: &Path,
    served: &str,
    debounce: Duration,
    clients: Arc<ReloadClientSet>,
) -> Result<WatcherHandle> {
    let served = served.trim_matches('/').to_string();
    let pattern = if served.is_empty() || served == "." {
        "**/*".to_string()
    } else {
        format!("{served}/**/*")
    };
    let paths = CompiledPathSet::compile("livereload", &[pattern])?;

    let (batch_tx, mut batch_rx) = mpsc::channel::<ChangeBatch>(16);
    let handle = watch(root, "livereload", paths, debounce, batch_tx)?;

    tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            for change in &batch.changes {
                let path = change
                    .path
                    .strip_prefix(&served)
                    .map(|p| p.trim_start_matches('/'))
                    .unwrap_or(&change.path);
                let reached = clients.notify(path);
                info!(path, clients = reached, "live reload");
            }
        }
    });

    Ok(handle)
}
