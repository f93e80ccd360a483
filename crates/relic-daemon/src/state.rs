// crates/relic-daemon/src/state.rs
//
// Lifecycle state machine for the Relic daemon.
//
// Valid transitions:
//   Initializing -> Opening -> Monitoring
//   Opening -> RunningOnce
//   Any state -> ShuttingDown

use std::fmt;

/// Lifecycle states of the daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Parsing arguments and loading configuration.
    Initializing,
    /// Opening the store and wiring the imagery source and sinks.
    Opening,
    /// The scheduler owns the site tasks.
    Monitoring,
    /// A single tick over every active site (`--once`).
    RunningOnce,
    /// Cancelling site tasks and exiting.
    ShuttingDown,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DaemonState::Initializing => "Initializing",
            DaemonState::Opening => "Opening",
            DaemonState::Monitoring => "Monitoring",
            DaemonState::RunningOnce => "RunningOnce",
            DaemonState::ShuttingDown => "ShuttingDown",
        };
        f.write_str(s)
    }
}

pub struct DaemonStateMachine {
    pub current: DaemonState,
}

impl DaemonStateMachine {
    pub fn new() -> Self {
        Self {
            current: DaemonState::Initializing,
        }
    }

    /// Attempt to transition to a new state.
    pub fn transition(&mut self, next: DaemonState) -> Result<(), String> {
        let valid = matches!(
            (self.current, next),
            (_, DaemonState::ShuttingDown)
                | (DaemonState::Initializing, DaemonState::Opening)
                | (DaemonState::Opening, DaemonState::Monitoring)
                | (DaemonState::Opening, DaemonState::RunningOnce)
        );
        if !valid {
            return Err(format!("Invalid state transition: {} -> {}", self.current, next));
        }
        tracing::info!("State transition: {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for DaemonStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
