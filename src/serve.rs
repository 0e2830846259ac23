// src/serve.rs

//! `serve [env]`: build, then supervise the dev server with live reload.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{serve_plan, ConfigFile};
use crate::engine::{GraphRunner, TaskName};
use crate::errors::{AssetdagError, Result};
use crate::exec::ExecutorBackend;
use crate::livereload::{self, ReloadClientSet};
use crate::supervisor::{RestartHook, Supervisor, SupervisorCommand};
use crate::types::BoxFuture;
use crate::watch::{watch, ChangeBatch, FileChange};

pub const ENV_VAR: &str = "ASSETDAG_ENV";

/// Runs the environment's tasks before each restart.
pub struct TaskRestartHook<E: ExecutorBackend> {
    runner: Arc<GraphRunner<E>>,
    tasks: Vec<TaskName>,
}

impl<E: ExecutorBackend> TaskRestartHook<E> {
    pub fn new(runner: Arc<GraphRunner<E>>, tasks: Vec<TaskName>) -> Self {
        Self { runner, tasks }
    }
}

impl<E: ExecutorBackend> RestartHook for TaskRestartHook<E> {
    fn before_restart<'a>(&'a self, changes: &'a [FileChange]) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.tasks.is_empty() {
                return;
            }
            info!(tasks = ?self.tasks, changes = changes.len(), "running restart tasks");
            match self.runner.run_many(&self.tasks).await {
                Ok(_) => {}
                Err(AssetdagError::TaskFailures(failures)) => {
                    warn!("restart tasks failed, restarting anyway: {failures}")
                }
                Err(err) => warn!(error = %err, "restart tasks failed, restarting anyway"),
            }
        })
    }
}

/// Pick the environment: the argument, then `ASSETDAG_ENV`, then the only
/// configured one.
pub fn resolve_env(cfg: &ConfigFile, requested: Option<String>) -> Result<String> {
    if let Some(env) = requested.or_else(|| std::env::var(ENV_VAR).ok()) {
        if !env.trim().is_empty() {
            return Ok(env.trim().to_string());
        }
    }
    let serve = cfg
        .serve
        .as_ref()
        .ok_or_else(|| AssetdagError::invalid_config("no [serve] section in config"))?;
    let mut names = serve.env.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        _ => Err(AssetdagError::invalid_config(format!(
            "several serve environments configured; pass one or set {ENV_VAR}"
        ))),
    }
}

pub async fn serve<E: ExecutorBackend + 'static>(
    cfg: &ConfigFile,
    root: &Path,
    runner: Arc<GraphRunner<E>>,
    env: Option<String>,
) -> Result<()> {
    let env = resolve_env(cfg, env)?;
    let plan = serve_plan(cfg, &env, root)?;
    let debounce = cfg.debounce()?;
    info!(env = %plan.env, command = %plan.server.command, "serving");

    if !plan.tasks.is_empty() {
        runner.run_many(&plan.tasks).await?;
    }

    let mut watchers = Vec::new();
    if let Some(addr) = cfg.livereload_addr()? {
        let clients = Arc::new(ReloadClientSet::new());
        let server_clients = clients.clone();
        tokio::spawn(async move {
            if let Err(err) = livereload::server::serve(addr, server_clients).await {
                error!(error = %err, "live-reload server stopped");
            }
        });
        match livereload::watch_served_dir(root, &plan.served_root, debounce, clients) {
            Ok(handle) => watchers.push(handle),
            Err(err) => error!(error = %err, "live reload disabled"),
        }
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<SupervisorCommand>(16);

    let (batch_tx, mut batch_rx) = mpsc::channel::<ChangeBatch>(16);
    match watch(root, "serve", plan.server.watch.clone(), debounce, batch_tx) {
        Ok(handle) => watchers.push(handle),
        Err(err) => error!(error = %err, "server restarts disabled"),
    }
    {
        let tx = cmd_tx.clone();
        tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                if tx.send(SupervisorCommand::Changed(batch.changes)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Ctrl-C -> graceful shutdown.
    {
        let tx = cmd_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(SupervisorCommand::Shutdown).await;
        });
    }
    drop(cmd_tx);

    let hook = Arc::new(TaskRestartHook::new(runner, plan.tasks.clone()));
    let result = Supervisor::new(plan.server)
        .with_restart_hook(hook)
        .run(cmd_rx)
        .await;
    drop(watchers);
    result
}
