//! tunebench-exec: Remote execution abstraction
//!
//! Runs commands against named targets, either over SSH or on the local machine.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeySource, authorized_key_command, read_public_key, shell_quote};
pub use local::LocalExecutor;
pub use result::{CommandResult, Credentials};
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
