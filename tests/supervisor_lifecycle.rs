// tests/supervisor_lifecycle.rs
#![cfg(unix)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use assetdag::paths::CompiledPathSet;
use assetdag::supervisor::{
    RestartHook, ServerSpec, ServerState, Supervisor, SupervisorCommand, SupervisorEvent,
};
use assetdag::types::{BoxFuture, ChangeKind};
use assetdag::watch::FileChange;
use assetdag_test_utils::{init_tracing, with_timeout_secs};

fn spec(root: &Path, command: &str) -> ServerSpec {
    let mut env = BTreeMap::new();
    env.insert("NODE_ENV".to_string(), "dev".to_string());
    ServerSpec {
        command: command.to_string(),
        cwd: root.to_path_buf(),
        env,
        watch: CompiledPathSet::compile("serve", &["server/**".to_string()]).unwrap(),
        extensions: vec!["js".to_string(), "html".to_string()],
        delay: Duration::ZERO,
        grace: Duration::from_secs(2),
    }
}

fn change(path: &str) -> SupervisorCommand {
    SupervisorCommand::Changed(vec![FileChange::new(path, ChangeKind::Modified)])
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>) -> SupervisorEvent {
    with_timeout_secs(10, rx.recv()).await.expect("supervisor event")
}

/// Collect events until `pred` matches one; returns everything seen.
async fn until<F>(rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>, pred: F) -> Vec<SupervisorEvent>
where
    F: Fn(&SupervisorEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// `Started` only means the shell was spawned, so poll until the server has
/// written the file.
async fn wait_for_contents(path: &Path) -> String {
    with_timeout_secs(10, async {
        loop {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if !contents.trim().is_empty() {
                    return contents;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

fn pid_alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[derive(Default)]
struct CountingHook(AtomicUsize);

impl RestartHook for CountingHook {
    fn before_restart<'a>(&'a self, _changes: &'a [FileChange]) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[tokio::test]
async fn start_then_restart_on_change() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let hook = Arc::new(CountingHook::default());

    let supervisor = Supervisor::new(spec(dir.path(), "echo $NODE_ENV > env.txt; exec sleep 30"))
        .with_restart_hook(hook.clone())
        .with_events(events_tx);
    let handle = tokio::spawn(supervisor.run(cmd_rx));

    let seen = until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Running))).await;
    assert_eq!(
        seen.iter().filter_map(|e| match e {
            SupervisorEvent::State(s) => Some(*s),
            _ => None,
        }).collect::<Vec<_>>(),
        vec![ServerState::Starting, ServerState::Running]
    );
    let first_pid = seen
        .iter()
        .find_map(|e| match e {
            SupervisorEvent::Started { pid, restart_count: 0 } => Some(*pid),
            _ => None,
        })
        .expect("first start");

    cmd_tx.send(change("server/server.js")).await.unwrap();

    let seen = until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Running))).await;
    let states: Vec<ServerState> = seen
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![ServerState::Restarting, ServerState::Starting, ServerState::Running]
    );

    let exited = seen
        .iter()
        .position(|e| matches!(e, SupervisorEvent::Exited { pid, expected: true, .. } if *pid == first_pid))
        .expect("old process exited");
    let started = seen
        .iter()
        .position(|e| matches!(e, SupervisorEvent::Started { restart_count: 1, .. }))
        .expect("new process started");
    assert!(exited < started, "old process must be gone before the new one starts");
    assert!(!pid_alive(first_pid));
    assert_eq!(hook.0.load(Ordering::SeqCst), 1);

    let env = wait_for_contents(&dir.path().join("env.txt")).await;
    assert_eq!(env.trim(), "dev");

    cmd_tx.send(SupervisorCommand::Shutdown).await.unwrap();
    with_timeout_secs(10, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn irrelevant_changes_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let supervisor = Supervisor::new(spec(dir.path(), "exec sleep 30")).with_events(events_tx);
    let handle = tokio::spawn(supervisor.run(cmd_rx));
    until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Running))).await;

    cmd_tx.send(change("server/readme.md")).await.unwrap();
    cmd_tx.send(change("client/app.js")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());

    cmd_tx.send(SupervisorCommand::Shutdown).await.unwrap();
    with_timeout_secs(10, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn crash_stops_until_next_change() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let supervisor = Supervisor::new(spec(dir.path(), "exit 3")).with_events(events_tx);
    let handle = tokio::spawn(supervisor.run(cmd_rx));

    let seen = until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Stopped))).await;
    assert!(seen.iter().any(|e| matches!(
        e,
        SupervisorEvent::Exited { code: Some(3), expected: false, .. }
    )));

    cmd_tx.send(change("server/server.js")).await.unwrap();
    let seen = until(&mut events, |e| matches!(e, SupervisorEvent::Started { .. })).await;
    assert!(seen.iter().any(|e| matches!(e, SupervisorEvent::Started { restart_count: 1, .. })));

    cmd_tx.send(SupervisorCommand::Shutdown).await.unwrap();
    with_timeout_secs(10, handle).await.unwrap().unwrap();
}

#[derive(Default)]
struct RecordingHook(Mutex<Vec<Vec<String>>>);

impl RestartHook for RecordingHook {
    fn before_restart<'a>(&'a self, changes: &'a [FileChange]) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let paths = changes.iter().map(|c| c.path.clone()).collect();
            self.0.lock().unwrap().push(paths);
        })
    }
}

#[tokio::test]
async fn changes_that_restarted_a_crashed_server_are_not_replayed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let hook = Arc::new(RecordingHook::default());

    // Crashes on the first start only.
    let command = "if [ -f started ]; then exec sleep 30; else touch started; exit 3; fi";
    let supervisor = Supervisor::new(spec(dir.path(), command))
        .with_restart_hook(hook.clone())
        .with_events(events_tx);
    let handle = tokio::spawn(supervisor.run(cmd_rx));
    until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Stopped))).await;

    cmd_tx.send(change("server/a.js")).await.unwrap();
    until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Running))).await;

    cmd_tx.send(change("server/b.js")).await.unwrap();
    until(&mut events, |e| matches!(e, SupervisorEvent::Started { restart_count: 2, .. })).await;

    assert_eq!(*hook.0.lock().unwrap(), vec![vec!["server/b.js".to_string()]]);

    cmd_tx.send(SupervisorCommand::Shutdown).await.unwrap();
    with_timeout_secs(10, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn server_ignoring_sigterm_is_killed_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let mut spec = spec(dir.path(), "trap '' TERM; while true; do sleep 1; done");
    spec.grace = Duration::from_millis(300);
    let supervisor = Supervisor::new(spec).with_events(events_tx);
    let handle = tokio::spawn(supervisor.run(cmd_rx));
    until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Running))).await;

    cmd_tx.send(SupervisorCommand::Shutdown).await.unwrap();
    let seen = until(&mut events, |e| matches!(e, SupervisorEvent::State(ServerState::Stopped))).await;
    assert!(seen.iter().any(|e| matches!(e, SupervisorEvent::Exited { expected: true, .. })));
    with_timeout_secs(10, handle).await.unwrap().unwrap();
}
