// src/supervisor/mod.rs

//! Dev-server supervisor.
//!
//! Keeps one server process alive and restarts it when a server-side file
//! changes. [`state`] decides what happens, [`process`] owns the child, and
//! [`Supervisor::run`] drives both from a command channel.
//!
//! Restart sequence: run the restart hook (e.g. `lint` and `test` tasks),
//! wait `delay`, SIGTERM the old process and wait up to `grace` for it,
//! spawn the new one. The old process is always gone before the new one
//! starts. Changes arriving meanwhile cause one follow-up restart.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::paths::CompiledPathSet;
use crate::types::BoxFuture;
use crate::watch::FileChange;

pub mod process;
pub mod state;

pub use process::{ProcessExit, ServerProcess};
pub use state::{Directive, ServerState, SupervisorFsm};

/// Everything needed to launch and restart the server.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub command: String,
    pub cwd: PathBuf,
    /// Added to the inherited environment (the env-name variable included).
    pub env: BTreeMap<String, String>,
    /// Server-side files; changes outside this set are ignored.
    pub watch: CompiledPathSet,
    /// Lower-case extensions without the dot. Empty accepts every file.
    pub extensions: Vec<String>,
    pub delay: Duration,
    pub grace: Duration,
}

impl ServerSpec {
    /// Whether a change should restart the server.
    pub fn is_relevant(&self, change: &FileChange) -> bool {
        if !self.watch.matches(&change.path) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        change
            .extension()
            .is_some_and(|ext| self.extensions.iter().any(|e| e.trim_start_matches('.') == ext))
    }
}

/// Work done before every restart, with the changes that caused it.
///
/// Failures are the hook's business: the server restarts regardless.
pub trait RestartHook: Send + Sync {
    fn before_restart<'a>(&'a self, changes: &'a [FileChange]) -> BoxFuture<'a, ()>;
}

#[derive(Debug, Clone)]
pub enum SupervisorCommand {
    Changed(Vec<FileChange>),
    Shutdown,
}

/// Lifecycle notifications, mostly for the CLI and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    State(ServerState),
    Started { pid: u32, restart_count: u32 },
    /// `expected` is true when the supervisor stopped the process itself.
    Exited {
        pid: u32,
        code: Option<i32>,
        expected: bool,
    },
    SpawnFailed(String),
}

pub struct Supervisor {
    spec: ServerSpec,
    hook: Option<Arc<dyn RestartHook>>,
    events: Option<mpsc::UnboundedSender<SupervisorEvent>>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("spec", &self.spec)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Mutable state of one [`Supervisor::run`].
struct Session {
    fsm: SupervisorFsm,
    current: Option<ServerProcess>,
    exit_tx: mpsc::UnboundedSender<ProcessExit>,
    exit_rx: mpsc::UnboundedReceiver<ProcessExit>,
    /// Changes gathered since the last restart began.
    pending_changes: Vec<FileChange>,
    shutdown: bool,
}

impl Supervisor {
    pub fn new(spec: ServerSpec) -> Self {
        Self {
            spec,
            hook: None,
            events: None,
        }
    }

    pub fn with_restart_hook(mut self, hook: Arc<dyn RestartHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn spec(&self) -> &ServerSpec {
        &self.spec
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn emit_state(&self, fsm: &SupervisorFsm) {
        self.emit(SupervisorEvent::State(fsm.state()));
    }

    /// Start the server and supervise it until [`SupervisorCommand::Shutdown`]
    /// arrives or the command channel closes.
    pub async fn run(self, mut commands: mpsc::Receiver<SupervisorCommand>) -> Result<()> {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let mut session = Session {
            fsm: SupervisorFsm::new(),
            current: None,
            exit_tx,
            exit_rx,
            pending_changes: Vec::new(),
            shutdown: false,
        };

        let directive = session.fsm.start();
        self.emit_state(&session.fsm);
        self.follow(directive, &mut session, &mut commands).await;

        while !session.shutdown {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(SupervisorCommand::Changed(changes)) => {
                            if !self.accept(&changes, &mut session) {
                                continue;
                            }
                            let directive = session.fsm.change();
                            if directive == Directive::Spawn {
                                // A fresh start from Stopped consumes these changes.
                                session.pending_changes.clear();
                            }
                            self.emit_state(&session.fsm);
                            self.follow(directive, &mut session, &mut commands).await;
                        }
                        Some(SupervisorCommand::Shutdown) | None => session.shutdown = true,
                    }
                }
                Some(exit) = session.exit_rx.recv() => {
                    self.on_exit(exit, &mut session);
                }
            }
        }

        if let Some(process) = session.current.take() {
            let pid = process.pid();
            info!(pid, "stopping server");
            let exit = process::stop(process, self.spec.grace, &mut session.exit_rx).await;
            self.emit(SupervisorEvent::Exited {
                pid,
                code: exit.and_then(|e| e.code),
                expected: true,
            });
        }
        session.fsm.stop();
        self.emit_state(&session.fsm);
        Ok(())
    }

    /// Keep relevant changes; returns whether any were kept.
    fn accept(&self, changes: &[FileChange], session: &mut Session) -> bool {
        let before = session.pending_changes.len();
        session
            .pending_changes
            .extend(changes.iter().filter(|c| self.spec.is_relevant(c)).cloned());
        session.pending_changes.len() > before
    }

    fn on_exit(&self, exit: ProcessExit, session: &mut Session) {
        let is_current = session.current.as_ref().is_some_and(|p| p.pid() == exit.pid);
        if !is_current {
            return;
        }
        session.current = None;
        match exit.code {
            Some(0) => warn!(pid = exit.pid, "server exited; waiting for a change to restart"),
            code => error!(pid = exit.pid, code = ?code, "server crashed; waiting for a change to restart"),
        }
        session.fsm.exited();
        self.emit(SupervisorEvent::Exited {
            pid: exit.pid,
            code: exit.code,
            expected: false,
        });
        self.emit_state(&session.fsm);
    }

    /// Carry out directives until the machine settles.
    async fn follow(
        &self,
        mut directive: Directive,
        session: &mut Session,
        commands: &mut mpsc::Receiver<SupervisorCommand>,
    ) {
        loop {
            directive = match directive {
                Directive::Nothing => return,
                Directive::Spawn => self.spawn(session),
                Directive::Restart => self.restart(session, commands).await,
            };
            if session.shutdown {
                return;
            }
        }
    }

    fn spawn(&self, session: &mut Session) -> Directive {
        match ServerProcess::spawn(
            &self.spec.command,
            &self.spec.cwd,
            &self.spec.env,
            session.exit_tx.clone(),
        ) {
            Ok(process) => {
                let pid = process.pid();
                let restart_count = session.fsm.restart_count();
                info!(pid, restart_count, command = %self.spec.command, "server started");
                session.current = Some(process);
                let directive = session.fsm.spawned();
                self.emit(SupervisorEvent::Started { pid, restart_count });
                self.emit_state(&session.fsm);
                directive
            }
            Err(err) => {
                error!(error = %err, "server failed to start; waiting for a change to retry");
                session.fsm.spawn_failed();
                self.emit(SupervisorEvent::SpawnFailed(err.to_string()));
                self.emit_state(&session.fsm);
                Directive::Nothing
            }
        }
    }

    async fn restart(
        &self,
        session: &mut Session,
        commands: &mut mpsc::Receiver<SupervisorCommand>,
    ) -> Directive {
        let changes = std::mem::take(&mut session.pending_changes);
        info!(
            changes = changes.len(),
            first = changes.first().map(|c| c.path.as_str()).unwrap_or(""),
            "restarting server"
        );

        if let Some(hook) = self.hook.clone() {
            self.pump(hook.before_restart(&changes), session, commands).await;
        }
        if !self.spec.delay.is_zero() {
            self.pump(tokio::time::sleep(self.spec.delay), session, commands).await;
        }

        if let Some(process) = session.current.take() {
            let pid = process.pid();
            let grace = self.spec.grace;
            let mut exit_rx = std::mem::replace(&mut session.exit_rx, mpsc::unbounded_channel().1);
            let exit = self
                .pump(process::stop(process, grace, &mut exit_rx), session, commands)
                .await;
            session.exit_rx = exit_rx;
            self.emit(SupervisorEvent::Exited {
                pid,
                code: exit.and_then(|e| e.code),
                expected: true,
            });
        }

        if session.shutdown {
            return Directive::Nothing;
        }
        let directive = session.fsm.old_process_gone();
        self.emit_state(&session.fsm);
        directive
    }

    /// Drive `fut` to completion while still taking commands: changes mark a
    /// follow-up restart, a shutdown request is remembered.
    async fn pump<F: Future>(
        &self,
        fut: F,
        session: &mut Session,
        commands: &mut mpsc::Receiver<SupervisorCommand>,
    ) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => return out,
                cmd = commands.recv(), if !session.shutdown => match cmd {
                    Some(SupervisorCommand::Changed(changes)) => {
                        if self.accept(&changes, session) {
                            session.fsm.change();
                        }
                    }
                    Some(SupervisorCommand::Shutdown) | None => session.shutdown = true,
                },
            }
        }
    }
}
