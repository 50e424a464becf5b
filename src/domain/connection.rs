// Connection state machine observed by the dashboard
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    CycleSucceeded,
    CycleFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} while {from}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

/// `connecting -> {connected, error}`, `connected -> {connected, error}`,
/// and back to `connecting` only through an explicit cycle request.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Timer-driven polls only run while connected
    pub fn accepts_timer_poll(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// A retry, channel switch or initial start began a visible cycle.
    /// Allowed from every state.
    pub fn request_cycle(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connecting;
        self.state
    }

    /// Apply the outcome of a cycle. Outcomes are rejected in `error`.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<ConnectionState, InvalidTransition> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        let next = match (self.state, event) {
            (Connecting | Connected, CycleSucceeded) => Connected,
            (Connecting | Connected, CycleFailed) => Error,
            (Error, CycleSucceeded | CycleFailed) => {
                return Err(InvalidTransition {
                    from: self.state,
                    event,
                });
            }
        };

        self.state = next;
        Ok(next)
    }
}
