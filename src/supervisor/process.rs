// src/supervisor/process.rs

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{AssetdagError, Result};

/// Reported by the monitor task once a server process has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: u32,
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

/// A running server process.
///
/// The `Child` itself lives in a monitor task that reports a [`ProcessExit`]
/// on the supervisor's exit channel. Dropping the handle kills the process.
#[derive(Debug)]
pub struct ServerProcess {
    pid: u32,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ServerProcess {
    /// Spawn `command` through the shell in `cwd`, with `env` added to the
    /// inherited environment.
    ///
    /// On unix the process leads its own process group, so signals reach
    /// whatever the shell started.
    pub fn spawn(
        command: &str,
        cwd: &Path,
        env: &BTreeMap<String, String>,
        exit_tx: mpsc::UnboundedSender<ProcessExit>,
    ) -> Result<Self> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        cmd.current_dir(cwd)
            .envs(env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| AssetdagError::ServerProcess(format!("spawning `{command}`: {e}")))?;
        let pid = child.id().ok_or_else(|| {
            AssetdagError::ServerProcess(format!("`{command}` exited before it could be tracked"))
        })?;

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    if let Err(err) = child.start_kill() {
                        debug!(pid, error = %err, "start_kill failed");
                    }
                    child.wait().await
                }
            };
            let code = match status {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(pid, error = %err, "waiting for server process failed");
                    None
                }
            };
            // The supervisor may already be gone during shutdown.
            let _ = exit_tx.send(ProcessExit { pid, code });
        });

        Ok(Self {
            pid,
            kill_tx: Some(kill_tx),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Ask the process to exit (SIGTERM to its group on unix).
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        signal_group(self.pid, libc::SIGTERM);
        #[cfg(not(unix))]
        self.kill();
    }

    /// Kill the process without waiting for it to clean up.
    pub fn kill(&mut self) {
        #[cfg(unix)]
        signal_group(self.pid, libc::SIGKILL);
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only
    // yields ESRCH.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(pid, signal, error = %std::io::Error::last_os_error(), "signalling server process group");
    }
}

/// Wait for the exit of `pid`, discarding reports about other processes.
pub async fn wait_for_exit(
    pid: u32,
    exit_rx: &mut mpsc::UnboundedReceiver<ProcessExit>,
) -> Option<ProcessExit> {
    while let Some(exit) = exit_rx.recv().await {
        if exit.pid == pid {
            return Some(exit);
        }
        debug!(pid = exit.pid, "ignoring exit of a previous server process");
    }
    None
}

/// Terminate `process` and wait for it; kill it if it is still alive after
/// `grace`.
pub async fn stop(
    mut process: ServerProcess,
    grace: Duration,
    exit_rx: &mut mpsc::UnboundedReceiver<ProcessExit>,
) -> Option<ProcessExit> {
    let pid = process.pid();
    process.terminate();
    match timeout(grace, wait_for_exit(pid, exit_rx)).await {
        Ok(exit) => exit,
        Err(_) => {
            warn!(pid, grace_ms = grace.as_millis() as u64, "server ignored SIGTERM, killing it");
            process.kill();
            wait_for_exit(pid, exit_rx).await
        }
    }
}
