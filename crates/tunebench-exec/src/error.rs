//! Error types for tunebench-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during remote execution
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection to {target} failed: {reason}")]
    ConnectionFailed {
        /// Target address
        target: String,
        /// Transport diagnostic
        reason: String,
    },

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connect attempt timed out
    #[error("connect to {target} timed out after {timeout:?}")]
    Timeout {
        /// Target address
        target: String,
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error on an established channel
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Whether the error means the target could not be reached.
    ///
    /// This is the expected condition while a host is rebooting.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed { .. } | ExecError::Timeout { .. } | ExecError::IoError(_)
        )
    }
}
