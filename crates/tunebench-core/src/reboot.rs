//! Reboot confirmation state machine

use std::fmt;

use tracing::info;

use crate::error::CoreError;

/// States of a single target's reboot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootState {
    /// Baseline read, reboot command issued
    Initiated,
    /// Settling before the first poll
    AwaitingDown,
    /// Polling the boot timestamp
    AwaitingUp,
    /// Boot timestamp changed
    Confirmed,
    /// Poll budget exhausted
    Unconfirmed,
}

impl RebootState {
    /// Whether `to` is a legal next state
    #[must_use]
    pub fn can_transition_to(self, to: RebootState) -> bool {
        use RebootState::{AwaitingDown, AwaitingUp, Confirmed, Initiated, Unconfirmed};
        matches!(
            (self, to),
            (Initiated, AwaitingDown)
                | (AwaitingDown, AwaitingUp)
                | (AwaitingUp, Confirmed | Unconfirmed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RebootState::Confirmed | RebootState::Unconfirmed)
    }
}

impl fmt::Display for RebootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebootState::Initiated => "initiated",
            RebootState::AwaitingDown => "awaiting-down",
            RebootState::AwaitingUp => "awaiting-up",
            RebootState::Confirmed => "confirmed",
            RebootState::Unconfirmed => "unconfirmed",
        };
        f.write_str(s)
    }
}

/// Tracks one target through the reboot states and counts polls
#[derive(Debug)]
pub struct RebootTracker {
    target: String,
    state: RebootState,
    polls: u32,
}

impl RebootTracker {
    /// Start tracking after the reboot command was issued
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: RebootState::Initiated,
            polls: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> RebootState {
        self.state
    }

    /// Polls consumed so far
    #[must_use]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` for an illegal move.
    pub fn transition_to(&mut self, to: RebootState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        info!(
            host = %self.target,
            from = %self.state,
            to = %to,
            polls = self.polls,
            "reboot state transition"
        );
        self.state = to;
        Ok(())
    }
}
