//! Core error types for tunebench-core

use thiserror::Error;
use tunebench_inventory::InventoryError;

use crate::reboot::RebootState;

/// Errors that abort an operation as a whole
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Inventory query failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// No targets matched
    #[error("no targets match selector {0:?}")]
    NoTargets(String),

    /// Invalid reboot state transition attempted
    #[error("invalid reboot state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: RebootState,
        /// Attempted target state
        to: RebootState,
    },

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Failure category of a single target's action.
///
/// These are reported in the target's outcome and never abort the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Exit code outside the changed and already-satisfied sets
    #[error("mutation failed with exit code {exit_code}")]
    MutationFailed {
        /// Exit code of the mutating command
        exit_code: i32,
    },

    /// The profile directory does not exist on the target
    #[error("profile path {path} not found")]
    ProfileMissing {
        /// Path that was checked
        path: String,
    },

    /// No reboot was observed within the poll budget
    #[error("no reboot observed after {attempts} polls")]
    ConvergenceTimeout {
        /// Polls consumed
        attempts: u32,
    },

    /// Environment-test server did not start
    #[error("server failed to start with exit code {exit_code}")]
    ServerStartFailed {
        /// Server command exit code
        exit_code: i32,
    },

    /// Environment-test client did not start
    #[error("client failed to start with exit code {exit_code}")]
    ClientStartFailed {
        /// Client command exit code
        exit_code: i32,
    },

    /// The target could not be reached
    #[error("connectivity: {0}")]
    Connectivity(String),
}

impl ActionError {
    /// Exit code carried by the failure, if any
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ActionError::MutationFailed { exit_code }
            | ActionError::ServerStartFailed { exit_code }
            | ActionError::ClientStartFailed { exit_code } => Some(*exit_code),
            _ => None,
        }
    }
}
