//! Run-state machine: Idle → Running → {Succeeded, Failed} → Idle.
//! Each run is independent; there is no persistent Succeeded state.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Succeeded => write!(f, "Succeeded"),
            RunState::Failed => write!(f, "Failed"),
        }
    }
}

impl RunState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Running, RunState::Succeeded)
                | (RunState::Running, RunState::Failed)
                | (RunState::Succeeded, RunState::Idle)
                | (RunState::Failed, RunState::Idle)
        )
    }
}

/// Thread-safe state holder with a watch channel for reactive subscribers.
pub struct RunStateMachine {
    state: RwLock<RunState>,
    state_tx: watch::Sender<RunState>,
    state_rx: watch::Receiver<RunState>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        Self {
            state: RwLock::new(RunState::Idle),
            state_tx,
            state_rx,
        }
    }

    /// Current state (non-blocking read).
    pub fn current(&self) -> RunState {
        *self.state.read()
    }

    /// Attempt a state transition. Returns the new state, or an error
    /// naming the rejected edge.
    pub fn transition(&self, next: RunState) -> Result<RunState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {current} -> {next}");
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        let _ = self.state_tx.send(next);
        info!(from = %current, to = %next, "run_state_transition");
        Ok(next)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_edges_only() {
        assert!(RunState::Idle.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Succeeded));
        assert!(RunState::Running.can_transition_to(RunState::Failed));
        assert!(RunState::Succeeded.can_transition_to(RunState::Idle));
        assert!(RunState::Failed.can_transition_to(RunState::Idle));

        assert!(!RunState::Idle.can_transition_to(RunState::Succeeded));
        assert!(!RunState::Idle.can_transition_to(RunState::Failed));
        assert!(!RunState::Succeeded.can_transition_to(RunState::Running));
    }

    #[test]
    fn rejected_transition_leaves_state_unchanged() {
        let machine = RunStateMachine::new();
        assert!(machine.transition(RunState::Succeeded).is_err());
        assert_eq!(machine.current(), RunState::Idle);
    }

    #[test]
    fn watchers_see_transitions() {
        let machine = RunStateMachine::new();
        let rx = machine.subscribe();
        machine.transition(RunState::Running).unwrap();
        assert_eq!(*rx.borrow(), RunState::Running);
    }
}
