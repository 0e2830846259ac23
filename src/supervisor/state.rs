// src/supervisor/state.rs

//! Pure state machine of the dev-server supervisor.
//!
//! ```text
//! Stopped -> Starting -> Running -(change)-> Restarting -> Starting -> Running
//!    ^          |           |
//!    +----------+-----------+  (spawn failure / unexpected exit)
//! ```
//!
//! The machine decides; the async shell in [`crate::supervisor`] spawns and
//! terminates processes and reports back.

use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Restarting,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

/// What the shell has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Nothing,
    /// Spawn a new server process.
    Spawn,
    /// Run the restart sequence: restart tasks, delay, terminate the current
    /// process, then report [`SupervisorFsm::old_process_gone`].
    Restart,
}

#[derive(Debug, Clone)]
pub struct SupervisorFsm {
    state: ServerState,
    restart_count: u32,
    /// A change arrived while starting or restarting.
    change_pending: bool,
}

impl Default for SupervisorFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorFsm {
    pub fn new() -> Self {
        Self {
            state: ServerState::Stopped,
            restart_count: 0,
            change_pending: false,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Number of launches after the first one.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn change_pending(&self) -> bool {
        self.change_pending
    }

    fn transition(&mut self, to: ServerState) {
        debug!(from = %self.state, to = %to, restart_count = self.restart_count, "server state");
        self.state = to;
    }

    /// Initial start.
    pub fn start(&mut self) -> Directive {
        match self.state {
            ServerState::Stopped => {
                self.transition(ServerState::Starting);
                Directive::Spawn
            }
            _ => Directive::Nothing,
        }
    }

    /// The process was spawned.
    pub fn spawned(&mut self) -> Directive {
        if self.state != ServerState::Starting {
            return Directive::Nothing;
        }
        self.transition(ServerState::Running);
        if self.change_pending {
            self.change_pending = false;
            self.transition(ServerState::Restarting);
            Directive::Restart
        } else {
            Directive::Nothing
        }
    }

    /// The process could not be spawned.
    pub fn spawn_failed(&mut self) {
        self.change_pending = false;
        self.transition(ServerState::Stopped);
    }

    /// A watched file changed.
    pub fn change(&mut self) -> Directive {
        match self.state {
            ServerState::Stopped => {
                self.restart_count += 1;
                self.transition(ServerState::Starting);
                Directive::Spawn
            }
            ServerState::Running => {
                self.transition(ServerState::Restarting);
                Directive::Restart
            }
            ServerState::Starting | ServerState::Restarting => {
                self.change_pending = true;
                Directive::Nothing
            }
        }
    }

    /// The process being restarted has exited.
    pub fn old_process_gone(&mut self) -> Directive {
        if self.state != ServerState::Restarting {
            return Directive::Nothing;
        }
        self.restart_count += 1;
        self.transition(ServerState::Starting);
        Directive::Spawn
    }

    /// The process exited on its own.
    pub fn exited(&mut self) {
        if self.state == ServerState::Running {
            self.transition(ServerState::Stopped);
        }
    }

    pub fn stop(&mut self) {
        self.change_pending = false;
        self.transition(ServerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_restarts_a_running_server() {
        let mut fsm = SupervisorFsm::new();
        assert_eq!(fsm.start(), Directive::Spawn);
        assert_eq!(fsm.state(), ServerState::Starting);
        assert_eq!(fsm.spawned(), Directive::Nothing);
        assert_eq!(fsm.state(), ServerState::Running);

        assert_eq!(fsm.change(), Directive::Restart);
        assert_eq!(fsm.state(), ServerState::Restarting);
        assert_eq!(fsm.old_process_gone(), Directive::Spawn);
        assert_eq!(fsm.state(), ServerState::Starting);
        assert_eq!(fsm.restart_count(), 1);
        fsm.spawned();
        assert_eq!(fsm.state(), ServerState::Running);
    }

    #[test]
    fn changes_during_restart_coalesce_into_one_follow_up() {
        let mut fsm = SupervisorFsm::new();
        fsm.start();
        fsm.spawned();
        fsm.change();

        assert_eq!(fsm.change(), Directive::Nothing);
        assert_eq!(fsm.change(), Directive::Nothing);
        assert!(fsm.change_pending());

        fsm.old_process_gone();
        assert_eq!(fsm.spawned(), Directive::Restart);
        assert_eq!(fsm.state(), ServerState::Restarting);
        assert!(!fsm.change_pending());

        fsm.old_process_gone();
        assert_eq!(fsm.spawned(), Directive::Nothing);
        assert_eq!(fsm.restart_count(), 2);
    }

    #[test]
    fn crash_stops_until_next_change() {
        let mut fsm = SupervisorFsm::new();
        fsm.start();
        fsm.spawned();
        fsm.exited();
        assert_eq!(fsm.state(), ServerState::Stopped);

        assert_eq!(fsm.change(), Directive::Spawn);
        assert_eq!(fsm.state(), ServerState::Starting);
    }

    #[test]
    fn spawn_failure_returns_to_stopped() {
        let mut fsm = SupervisorFsm::new();
        fsm.start();
        fsm.change();
        fsm.spawn_failed();
        assert_eq!(fsm.state(), ServerState::Stopped);
        assert!(!fsm.change_pending());
    }
}
