//! Error types for tunebench-inventory

use thiserror::Error;

/// Errors that can occur during inventory operations
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// Backend query exited non-zero
    #[error("query `{command}` failed: {diagnostic}")]
    QueryFailed {
        /// Query that was run
        command: String,
        /// Backend diagnostic text
        diagnostic: String,
    },

    /// No host matched the identifier after a full scan
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// No switch matched the identifier after a full scan
    #[error("switch not found: {0}")]
    SwitchNotFound(String),

    /// No VM matched the name
    #[error("VM not found: {0}")]
    VmNotFound(String),

    /// Host hardware has no device with this PCI id
    #[error("PCI device {pci_id} not found on host {host}")]
    PciDeviceNotFound {
        /// Host identifier that was resolved
        host: String,
        /// PCI address searched
        pci_id: String,
    },

    /// Failed to parse a structured response
    #[error("parse error: {0}")]
    ParseError(String),

    /// Remote execution error
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl From<tunebench_exec::ExecError> for InventoryError {
    fn from(e: tunebench_exec::ExecError) -> Self {
        InventoryError::ExecutionError(e.to_string())
    }
}
