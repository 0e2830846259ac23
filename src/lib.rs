// src/lib.rs

pub mod clean;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod livereload;
pub mod logging;
pub mod paths;
pub mod serve;
pub mod supervisor;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::{CliArgs, Command};
use crate::config::{build_registry, build_watch_groups, load_and_validate, ConfigFile};
use crate::dag::Registry;
use crate::engine::{GraphRunner, TaskName, WatchCore, WatchEvent, WatchRuntime};
use crate::errors::{AssetdagError, Result};
use crate::exec::RealExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::transform::{open_hash_store, StepContext};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config (the directory holding it is the project
/// root), then dispatches the subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    match args.command {
        Command::ListTasks => {
            print_tasks(&cfg);
            Ok(())
        }
        Command::Run { tasks } => run_tasks(&cfg, &root, &tasks).await,
        Command::Watch => watch(&cfg, &root).await,
        Command::Serve { env } => {
            let runner = Arc::new(build_runner(&cfg, &root)?);
            serve::serve(&cfg, &root, runner, env).await
        }
        Command::Clean => {
            let report = clean::clean(&RealFileSystem, &root, &cfg.config.stage)?;
            println!("removed {} file(s) from {}", report.files_removed, cfg.config.stage);
            Ok(())
        }
    }
}

/// Runner over the configured tasks, executing steps against the real
/// filesystem under `root`.
pub fn build_runner(cfg: &ConfigFile, root: &Path) -> Result<GraphRunner<RealExecutorBackend>> {
    let registry = Arc::new(build_registry(cfg)?);
    Ok(runner_for(registry, cfg, root))
}

fn runner_for(
    registry: Arc<Registry>,
    cfg: &ConfigFile,
    root: &Path,
) -> GraphRunner<RealExecutorBackend> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let hashes = open_hash_store(cfg.config.hash_storage, root, fs.clone());
    let ctx = StepContext::new(root.to_path_buf(), fs, hashes);
    GraphRunner::new(registry, RealExecutorBackend::new(ctx))
}

async fn run_tasks(cfg: &ConfigFile, root: &Path, tasks: &[TaskName]) -> Result<()> {
    let runner = build_runner(cfg, root)?;
    let report = runner.run_many(tasks).await?;
    info!(
        roots = ?report.roots,
        tasks = report.completed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "build finished"
    );
    Ok(())
}

async fn watch(cfg: &ConfigFile, root: &Path) -> Result<()> {
    let groups = build_watch_groups(cfg)?;
    if groups.is_empty() {
        return Err(AssetdagError::invalid_config(
            "no [[watch]] groups configured",
        ));
    }
    let debounce = cfg.debounce()?;
    let registry = Arc::new(build_registry(cfg)?);
    let runner = Arc::new(runner_for(registry.clone(), cfg, root));

    let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(64);
    let (handles, mut failures) =
        watch::spawn_group_watchers(root, &groups, debounce, event_tx.clone());
    if handles.is_empty() {
        return Err(failures.remove(0));
    }
    info!(groups = handles.len(), failed = failures.len(), "watching");

    // Ctrl-C -> graceful shutdown.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(WatchEvent::ShutdownRequested).await;
        });
    }

    let core = WatchCore::new(registry);
    let runtime = WatchRuntime::new(core, runner, event_rx, event_tx);
    let result = runtime.run().await;
    drop(handles);
    result
}

/// Figure out the project root from the config path.
///
/// A bare file name ("Assetdag.toml") means the working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_tasks(cfg: &ConfigFile) {
    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        match &task.description {
            Some(description) => println!("  {name:<16} {description}"),
            None => println!("  {name}"),
        }
        if !task.after.is_empty() {
            println!("      after: {}", task.after.join(", "));
        }
        if !task.step.is_empty() {
            println!("      steps: {}", task.step.len());
        }
    }
}
