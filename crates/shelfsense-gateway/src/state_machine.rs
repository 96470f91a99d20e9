//! Put-in / take-out workflow state machine.
//!
//! Every order run by the orchestrator walks this machine, so sequencing
//! mistakes surface as [`Error::InvalidStateTransition`] instead of wrong
//! bytes on a link.
//!
//! # States
//!
//! - `AwaitingAuthorization`: waiting for the RFID gate (put-in only)
//! - `Unlocked`: authorized, start sentinel emitted
//! - `PollingItem(i)`: directive, open and progress polling for item `i`
//! - `ItemClosed(i)`: item `i` reached its target and its lock was closed
//! - `Finished`: finish sentinel emitted
//! - `Failed`: aborted by an error or cancellation
//!
//! # Valid Transitions
//!
//! - AwaitingAuthorization → Unlocked
//! - Unlocked → PollingItem(0) | Finished (empty order)
//! - PollingItem(i) → ItemClosed(i)
//! - ItemClosed(i) → PollingItem(i + 1) | Finished
//! - any non-terminal state → Failed
//!
//! # Examples
//!
//! ```
//! use shelfsense_gateway::{WorkflowMachine, WorkflowState};
//!
//! let mut machine = WorkflowMachine::new();
//! machine.transition_to(WorkflowState::Unlocked).unwrap();
//! machine.transition_to(WorkflowState::PollingItem(0)).unwrap();
//! assert!(machine.transition_to(WorkflowState::PollingItem(1)).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use shelfsense_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// An order of `n` items takes `2n + 2` transitions; 100 covers any order a
/// unit rack realistically receives.
const MAX_HISTORY_SIZE: usize = 100;

/// States of one put-in or take-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AwaitingAuthorization,
    Unlocked,
    PollingItem(usize),
    ItemClosed(usize),
    Finished,
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::AwaitingAuthorization => write!(f, "AwaitingAuthorization"),
            WorkflowState::Unlocked => write!(f, "Unlocked"),
            WorkflowState::PollingItem(i) => write!(f, "PollingItem({i})"),
            WorkflowState::ItemClosed(i) => write!(f, "ItemClosed({i})"),
            WorkflowState::Finished => write!(f, "Finished"),
            WorkflowState::Failed => write!(f, "Failed"),
        }
    }
}

impl WorkflowState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// ```
    /// use shelfsense_gateway::WorkflowState;
    ///
    /// assert!(WorkflowState::ItemClosed(0).can_transition_to(&WorkflowState::PollingItem(1)));
    /// assert!(!WorkflowState::ItemClosed(0).can_transition_to(&WorkflowState::PollingItem(2)));
    /// assert!(!WorkflowState::Finished.can_transition_to(&WorkflowState::Failed));
    /// ```
    pub fn can_transition_to(&self, target: &WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, target) {
            (Finished | Failed, _) => false,
            (_, Failed) => true,
            (AwaitingAuthorization, Unlocked) => true,
            (Unlocked, PollingItem(0) | Finished) => true,
            (PollingItem(i), ItemClosed(j)) => i == j,
            (ItemClosed(i), PollingItem(j)) => *j == i + 1,
            (ItemClosed(_), Finished) => true,
            _ => false,
        }
    }

    /// Returns `true` for `Finished` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Finished | WorkflowState::Failed)
    }

    /// Index of the item this state refers to, if any.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            WorkflowState::PollingItem(i) | WorkflowState::ItemClosed(i) => Some(*i),
            _ => None,
        }
    }
}

/// A single state transition with timestamp.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: WorkflowState, to: WorkflowState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Time since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine for one order.
///
/// Not thread-safe; each workflow task owns its own machine.
#[derive(Debug)]
pub struct WorkflowMachine {
    current_state: WorkflowState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl Default for WorkflowMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowMachine {
    /// Create a machine in `AwaitingAuthorization`.
    pub fn new() -> Self {
        Self {
            current_state: WorkflowState::AwaitingAuthorization,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &WorkflowState {
        &self.current_state
    }

    /// Time elapsed in the current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Transition to `new_state`, validating the move.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the move is not allowed
    /// from the current state. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: WorkflowState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition.clone());

        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;
        Ok(transition)
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current_state.is_terminal() {
            let _ = self.transition_to(WorkflowState::Failed);
        }
    }
}
